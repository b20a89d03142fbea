use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::protocol::MotionSample;

/// How per-channel change verdicts combine into one candidate verdict.
/// Observed firmware revisions disagreed on this, so it stays configurable
/// instead of hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisCombine {
    /// Either lateral axis moved AND the amplitude channel moved.
    #[default]
    LateralOrThenAmplitude,
    /// Any single channel moving is enough.
    AnyChannel,
    /// All three channels must move.
    AllChannels,
}

/// Live-tunable percentage-change threshold, clamped to 0..=100. Same
/// snapshot-per-sample discipline as the sound threshold.
#[derive(Debug)]
pub struct MotionSettings {
    percent_threshold: AtomicU32,
}

impl MotionSettings {
    pub fn new(percent: u32) -> Arc<Self> {
        let settings = Arc::new(Self {
            percent_threshold: AtomicU32::new(0),
        });
        settings.set_percent_threshold(percent);
        settings
    }

    pub fn set_percent_threshold(&self, percent: u32) {
        self.percent_threshold
            .store(percent.min(100), Ordering::Relaxed);
    }

    pub fn percent_threshold(&self) -> u32 {
        self.percent_threshold.load(Ordering::Relaxed)
    }
}

/// Compares each channel of a sample against the previous one. A channel
/// counts as moved when it changed by more than the threshold percentage of
/// its previous magnitude. The verdict is recomputed on every sample and
/// decays the moment change falls back under threshold; nothing latches.
pub struct CandidateDetector {
    settings: Arc<MotionSettings>,
    combine: AxisCombine,
    prev: Option<MotionSample>,
}

impl CandidateDetector {
    pub fn new(settings: Arc<MotionSettings>, combine: AxisCombine) -> Self {
        Self {
            settings,
            combine,
            prev: None,
        }
    }

    pub fn update(&mut self, sample: MotionSample) -> bool {
        let verdict = match self.prev {
            // Nothing to compare against yet.
            None => false,
            Some(prev) => {
                let pct = self.settings.percent_threshold();
                let x = exceeds_percent(prev.x, sample.x, pct);
                let y = exceeds_percent(prev.y, sample.y, pct);
                let adc = exceeds_percent(prev.adc, sample.adc, pct);
                match self.combine {
                    AxisCombine::LateralOrThenAmplitude => (x || y) && adc,
                    AxisCombine::AnyChannel => x || y || adc,
                    AxisCombine::AllChannels => x && y && adc,
                }
            }
        };
        self.prev = Some(sample);
        verdict
    }
}

fn exceeds_percent(prev: i32, current: i32, percent: u32) -> bool {
    let delta = (current as i64 - prev as i64).abs();
    // A previous value of zero would make any change infinite; treat it as
    // magnitude one so the comparison stays defined.
    let base = (prev as i64).abs().max(1);
    delta * 100 > base * percent as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: i32, y: i32, adc: i32) -> MotionSample {
        MotionSample { x, y, adc }
    }

    #[test]
    fn first_sample_is_never_a_candidate() {
        let mut det = CandidateDetector::new(MotionSettings::new(35), AxisCombine::default());
        assert!(!det.update(sample(1000, 1000, 1000)));
    }

    #[test]
    fn lateral_or_then_amplitude_needs_both_sides() {
        let mut det = CandidateDetector::new(MotionSettings::new(35), AxisCombine::default());
        det.update(sample(1000, 1000, 1000));

        // X jumps but ADC stays flat: no candidate.
        assert!(!det.update(sample(2000, 1000, 1000)));
        // Both X and ADC jump: candidate.
        assert!(det.update(sample(4000, 1000, 2000)));
        // Everything flat again: verdict decays immediately.
        assert!(!det.update(sample(4000, 1000, 2000)));
    }

    #[test]
    fn any_channel_mode_fires_on_single_axis() {
        let mut det = CandidateDetector::new(MotionSettings::new(35), AxisCombine::AnyChannel);
        det.update(sample(1000, 1000, 1000));
        assert!(det.update(sample(1000, 2000, 1000)));
    }

    #[test]
    fn all_channels_mode_requires_every_axis() {
        let mut det = CandidateDetector::new(MotionSettings::new(35), AxisCombine::AllChannels);
        det.update(sample(1000, 1000, 1000));
        assert!(!det.update(sample(2000, 2000, 1000)));
        assert!(det.update(sample(4000, 4000, 2000)));
    }

    #[test]
    fn threshold_is_percent_of_previous_magnitude() {
        assert!(!exceeds_percent(1000, 1350, 35));
        assert!(exceeds_percent(1000, 1351, 35));
        assert!(exceeds_percent(-1000, -1351, 35));
    }

    #[test]
    fn zero_previous_value_counts_any_change() {
        assert!(exceeds_percent(0, 1, 35));
        assert!(!exceeds_percent(0, 0, 35));
    }

    #[test]
    fn threshold_can_change_between_samples() {
        let settings = MotionSettings::new(50);
        let mut det = CandidateDetector::new(settings.clone(), AxisCombine::AnyChannel);
        det.update(sample(1000, 1000, 1000));
        assert!(!det.update(sample(1400, 1000, 1000)));

        settings.set_percent_threshold(10);
        assert!(det.update(sample(1000, 1000, 1000)));
    }
}
