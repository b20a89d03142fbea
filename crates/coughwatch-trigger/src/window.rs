/// Extraction-window state machine with exactly two states: `Idle` (no
/// window) and `Armed(close_offset)`.
///
/// Arming computes where the window closes: half a buffer's worth of frames
/// after the triggering frame, wrapped into range, which leaves the trigger
/// near the midpoint of the extracted clip. There is no cancellation path;
/// the write cursor keeps advancing while the session records, so an armed
/// window always reaches its close offset.
#[derive(Debug)]
pub struct WindowScheduler {
    frame_size: usize,
    frames_per_recording: usize,
    close_offset: Option<usize>,
}

impl WindowScheduler {
    pub fn new(frame_size: usize, frames_per_recording: usize) -> Self {
        assert!(frame_size > 0);
        assert!(frames_per_recording >= 2);
        Self {
            frame_size,
            frames_per_recording,
            close_offset: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.close_offset.is_some()
    }

    pub fn close_offset(&self) -> Option<usize> {
        self.close_offset
    }

    /// Arms a window for the frame written at `trigger_offset` (a sample
    /// offset on a frame boundary). First trigger wins: while a window is
    /// pending, later triggers are ignored, so overlapping events collapse
    /// into a single widened clip. Returns the close offset when newly
    /// armed.
    pub fn arm(&mut self, trigger_offset: usize) -> Option<usize> {
        if self.close_offset.is_some() {
            return None;
        }
        debug_assert_eq!(trigger_offset % self.frame_size, 0);

        let trigger_frame = trigger_offset / self.frame_size;
        let close_frame =
            (trigger_frame + self.frames_per_recording / 2 - 1) % self.frames_per_recording;
        let close_offset = close_frame * self.frame_size;
        self.close_offset = Some(close_offset);
        Some(close_offset)
    }

    /// Called with the offset of each frame as it lands in the ring. True
    /// exactly once per armed window, when the closing frame has just been
    /// written, at which point the armed state clears and the caller must
    /// extract immediately.
    pub fn check_close(&mut self, frame_offset: usize) -> bool {
        if self.close_offset == Some(frame_offset) {
            self.close_offset = None;
            true
        } else {
            false
        }
    }
}
