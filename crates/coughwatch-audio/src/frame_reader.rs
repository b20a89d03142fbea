use super::handoff::FrameConsumer;

/// One microphone read's worth of mono PCM, stamped at the frame's end.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    /// Monotonic capture timestamp in nanoseconds since the session began.
    /// Always nonzero: zero is reserved as the ring's never-written sentinel.
    pub timestamp_ns: u64,
}

/// Slices the handoff conduit into exact fixed-size frames and reconstructs
/// per-frame timestamps from the running sample count, so timestamps stay
/// deterministic regardless of when the pipeline task gets scheduled.
pub struct FrameReader {
    consumer: FrameConsumer,
    frame_size: usize,
    sample_rate: u32,
    samples_read: u64,
}

impl FrameReader {
    pub fn new(consumer: FrameConsumer, frame_size: usize, sample_rate: u32) -> Self {
        Self {
            consumer,
            frame_size,
            sample_rate,
            samples_read: 0,
        }
    }

    /// Next frame, or None until a full frame's worth of samples arrives.
    pub fn read_frame(&mut self) -> Option<AudioFrame> {
        let mut samples = vec![0i16; self.frame_size];
        if !self.consumer.read_exact(&mut samples) {
            return None;
        }

        self.samples_read += self.frame_size as u64;
        let timestamp_ns = self.samples_read * 1_000_000_000 / self.sample_rate as u64;

        Some(AudioFrame {
            samples,
            timestamp_ns,
        })
    }

    pub fn available_samples(&self) -> usize {
        self.consumer.slots()
    }

    /// True once the capture side is gone and no more frames will arrive.
    pub fn source_disconnected(&self) -> bool {
        self.consumer.is_abandoned()
    }
}
