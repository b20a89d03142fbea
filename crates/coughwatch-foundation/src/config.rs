use serde::{Deserialize, Serialize};

/// Audio session parameters. Fixed for the lifetime of one recording
/// session; a new session re-reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (mono, 16-bit).
    pub sample_rate_hz: u32,
    /// Samples per frame handed to the pipeline per read.
    pub frame_size_samples: usize,
    /// Seconds of audio the session ring holds.
    pub record_seconds: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            frame_size_samples: 1024,
            record_seconds: 6,
        }
    }
}

impl AudioConfig {
    /// Whole frames the session ring holds.
    pub fn frames_per_recording(&self) -> usize {
        (self.record_seconds as usize * self.sample_rate_hz as usize) / self.frame_size_samples
    }

    /// Ring capacity in samples, rounded down to a whole number of frames.
    pub fn capacity_samples(&self) -> usize {
        self.frames_per_recording() * self.frame_size_samples
    }

    pub fn validate(&self) -> Result<(), crate::AppError> {
        if self.sample_rate_hz == 0 {
            return Err(crate::AppError::Config("sample rate must be nonzero".into()));
        }
        if self.frame_size_samples == 0 {
            return Err(crate::AppError::Config("frame size must be nonzero".into()));
        }
        if self.frames_per_recording() < 2 {
            return Err(crate::AppError::Config(format!(
                "recording window too short: {}s at {}Hz holds fewer than two {}-sample frames",
                self.record_seconds, self.sample_rate_hz, self.frame_size_samples
            )));
        }
        Ok(())
    }
}

/// Examination metadata attached verbatim to every upload. Supplied by the
/// session owner; never interpreted by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Examination {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_whole_frames() {
        let cfg = AudioConfig {
            sample_rate_hz: 48_000,
            frame_size_samples: 1024,
            record_seconds: 6,
        };
        // 6 * 48000 = 288000 samples -> 281 whole frames
        assert_eq!(cfg.frames_per_recording(), 281);
        assert_eq!(cfg.capacity_samples(), 281 * 1024);
        assert_eq!(cfg.capacity_samples() % cfg.frame_size_samples, 0);
    }

    #[test]
    fn rejects_degenerate_windows() {
        let cfg = AudioConfig {
            sample_rate_hz: 8_000,
            frame_size_samples: 8_192,
            record_seconds: 1,
        };
        assert!(cfg.validate().is_err());
    }
}
