use rtrb::{Consumer, Producer, RingBuffer};
use tracing::warn;

/// SPSC sample conduit between the audio callback and the pipeline task.
/// Built on rtrb so the producer side stays real-time safe: no locks, no
/// allocation, no blocking.
pub struct HandoffRing {
    producer: Producer<i16>,
    consumer: Consumer<i16>,
}

impl HandoffRing {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Split into producer and consumer halves for separate threads.
    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        (
            FrameProducer {
                producer: self.producer,
            },
            FrameConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the audio callback.
pub struct FrameProducer {
    producer: Producer<i16>,
}

impl FrameProducer {
    /// Write one callback's samples (non-blocking). On overflow the whole
    /// batch is dropped and the caller's stats record it; partial frames
    /// must never enter the conduit.
    pub fn write(&mut self, samples: &[i16]) -> Result<usize, ()> {
        let mut chunk = match self.producer.write_chunk(samples.len()) {
            Ok(chunk) => chunk,
            Err(_) => {
                warn!(
                    "handoff overflow: dropped a {}-sample batch, conduit full",
                    samples.len()
                );
                return Err(());
            }
        };

        // The chunk may wrap; fill both slices.
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&samples[..split]);
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..]);
        }
        chunk.commit_all();
        Ok(samples.len())
    }

    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half, owned by the pipeline task.
pub struct FrameConsumer {
    consumer: Consumer<i16>,
}

impl FrameConsumer {
    /// Pop exactly `out.len()` samples, or nothing at all. Frames keep
    /// their exact size through the handoff.
    pub fn read_exact(&mut self, out: &mut [i16]) -> bool {
        let chunk = match self.consumer.read_chunk(out.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(_)) => return false,
        };

        let (first, second) = chunk.as_slices();
        let split = first.len();
        out[..split].copy_from_slice(first);
        if !second.is_empty() {
            out[split..].copy_from_slice(second);
        }
        chunk.commit_all();
        true
    }

    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }

    /// True once the producer half has been dropped (capture is gone).
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_read_waits_for_full_frame() {
        let (mut producer, mut consumer) = HandoffRing::new(64).split();

        producer.write(&[1, 2, 3]).unwrap();
        let mut out = [0i16; 4];
        assert!(!consumer.read_exact(&mut out));

        producer.write(&[4]).unwrap();
        assert!(consumer.read_exact(&mut out));
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn overflow_drops_whole_batch() {
        let (mut producer, mut consumer) = HandoffRing::new(8).split();

        assert!(producer.write(&[0i16; 8]).is_ok());
        assert!(producer.write(&[1i16; 1]).is_err());

        let mut out = [7i16; 8];
        assert!(consumer.read_exact(&mut out));
        assert_eq!(out, [0i16; 8]);
    }

    #[test]
    fn abandoned_after_producer_drop() {
        let (producer, consumer) = HandoffRing::new(8).split();
        assert!(!consumer.is_abandoned());
        drop(producer);
        assert!(consumer.is_abandoned());
    }
}
