use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Live-tunable trigger threshold. Control surfaces update it atomically at
/// any time; the pipeline takes one snapshot per frame, so a change applies
/// on the next evaluated frame, never mid-frame.
#[derive(Debug)]
pub struct TriggerSettings {
    sound_threshold: AtomicI32,
}

impl TriggerSettings {
    pub fn new(sound_threshold: i32) -> Arc<Self> {
        let settings = Arc::new(Self {
            sound_threshold: AtomicI32::new(0),
        });
        settings.set_sound_threshold(sound_threshold);
        settings
    }

    /// Clamped to the 16-bit sample magnitude range.
    pub fn set_sound_threshold(&self, value: i32) {
        self.sound_threshold
            .store(value.clamp(0, i16::MAX as i32), Ordering::Relaxed);
    }

    pub fn sound_threshold(&self) -> i32 {
        self.sound_threshold.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_clamped_to_sample_range() {
        let settings = TriggerSettings::new(7000);
        assert_eq!(settings.sound_threshold(), 7000);

        settings.set_sound_threshold(-5);
        assert_eq!(settings.sound_threshold(), 0);

        settings.set_sound_threshold(100_000);
        assert_eq!(settings.sound_threshold(), i16::MAX as i32);
    }
}
