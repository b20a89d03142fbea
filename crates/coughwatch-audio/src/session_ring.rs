use super::frame_reader::AudioFrame;

/// Session audio in chronological order, ready for encoding. Owns its own
/// copy, so the live ring can keep recording while this is encoded.
#[derive(Debug)]
pub struct LinearizedClip {
    /// Little-endian 16-bit PCM.
    pub pcm: Vec<u8>,
    /// Capture timestamp of each frame, oldest first.
    pub frame_timestamps_ns: Vec<u64>,
}

impl LinearizedClip {
    pub fn frames(&self) -> usize {
        self.frame_timestamps_ns.len()
    }
}

/// Circular sample store for one recording session, plus a parallel
/// per-frame-slot timestamp store. A timestamp of 0 marks a slot that has
/// never been written.
///
/// Owned exclusively by the pipeline task: one writer, one reader, no
/// interior locking. Allocated fresh per session so no samples leak from a
/// previous one.
pub struct SessionRing {
    samples: Vec<i16>,
    frame_timestamps_ns: Vec<u64>,
    frame_size: usize,
    write_cursor: usize,
}

impl SessionRing {
    /// Capacity is `record_seconds * sample_rate` rounded down to a whole
    /// number of frames, so the write cursor always lands on a frame
    /// boundary.
    pub fn new(sample_rate_hz: u32, record_seconds: u32, frame_size: usize) -> Self {
        let frames = (record_seconds as usize * sample_rate_hz as usize) / frame_size;
        assert!(frames >= 2, "session ring must hold at least two frames");
        Self {
            samples: vec![0; frames * frame_size],
            frame_timestamps_ns: vec![0; frames],
            frame_size,
            write_cursor: 0,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frames_per_recording(&self) -> usize {
        self.frame_timestamps_ns.len()
    }

    /// Capacity in samples; always an exact multiple of the frame size.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Sample offset the next frame will be written at.
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// Copies the frame in at the cursor, stamps its timestamp slot, and
    /// returns the offset the frame landed at (the pre-write cursor).
    /// Never fails and never blocks.
    ///
    /// Panics if the frame length differs from the configured frame size;
    /// the frame reader guarantees exact sizing, so a mismatch is a
    /// programming error, not a runtime condition.
    pub fn write(&mut self, frame: &AudioFrame) -> usize {
        assert_eq!(
            frame.samples.len(),
            self.frame_size,
            "frame length must equal the configured frame size"
        );
        debug_assert_eq!(self.write_cursor % self.frame_size, 0);
        debug_assert_ne!(frame.timestamp_ns, 0, "timestamp 0 marks an empty slot");

        let offset = self.write_cursor;
        self.samples[offset..offset + self.frame_size].copy_from_slice(&frame.samples);
        self.frame_timestamps_ns[offset / self.frame_size] = frame.timestamp_ns;
        self.write_cursor = (offset + self.frame_size) % self.capacity();
        offset
    }

    fn populated_frames(&self) -> usize {
        self.frame_timestamps_ns.iter().filter(|&&t| t != 0).count()
    }

    /// True once every slot has been written at least once.
    pub fn is_fully_populated(&self) -> bool {
        !self.frame_timestamps_ns.contains(&0)
    }

    /// Ring contents in chronological order. Once the ring has wrapped, the
    /// region after the cursor is the oldest audio and the region before it
    /// the newest, so the two are concatenated in that order. Before the
    /// first wrap only the populated prefix is returned, already in order.
    /// Sample bytes are emitted little-endian regardless of host.
    pub fn linearize(&self) -> LinearizedClip {
        if !self.is_fully_populated() {
            let frames = self.populated_frames();
            let mut pcm = Vec::with_capacity(frames * self.frame_size * 2);
            for &s in &self.samples[..frames * self.frame_size] {
                pcm.extend_from_slice(&s.to_le_bytes());
            }
            return LinearizedClip {
                pcm,
                frame_timestamps_ns: self.frame_timestamps_ns[..frames].to_vec(),
            };
        }

        let mut pcm = Vec::with_capacity(self.capacity() * 2);
        for &s in self.samples[self.write_cursor..]
            .iter()
            .chain(&self.samples[..self.write_cursor])
        {
            pcm.extend_from_slice(&s.to_le_bytes());
        }

        let cursor_frame = self.write_cursor / self.frame_size;
        let mut frame_timestamps_ns = Vec::with_capacity(self.frames_per_recording());
        frame_timestamps_ns.extend_from_slice(&self.frame_timestamps_ns[cursor_frame..]);
        frame_timestamps_ns.extend_from_slice(&self.frame_timestamps_ns[..cursor_frame]);

        LinearizedClip {
            pcm,
            frame_timestamps_ns,
        }
    }
}
