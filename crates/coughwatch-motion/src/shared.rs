use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use coughwatch_trigger::CorroborationGate;

use super::protocol::MotionSample;

/// State shared between the motion thread and its readers: the reader
/// thread writes, the pipeline and display layers read. Plain atomics are
/// enough since the only cross-thread requirement is visibility.
#[derive(Default)]
pub struct MotionShared {
    connected: AtomicBool,
    candidate: AtomicBool,
    last_sample: Mutex<Option<MotionSample>>,
}

impl MotionShared {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
        if !connected {
            // A dead link must not leave a stale candidate verdict behind.
            self.candidate.store(false, Ordering::Relaxed);
        }
    }

    /// Publish the newest sample and its candidate verdict together.
    pub fn record(&self, sample: MotionSample, candidate: bool) {
        *self.last_sample.lock() = Some(sample);
        self.candidate.store(candidate, Ordering::Relaxed);
    }

    /// Latest raw reading, for display layers.
    pub fn last_sample(&self) -> Option<MotionSample> {
        *self.last_sample.lock()
    }
}

impl CorroborationGate for MotionShared {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn is_candidate(&self) -> bool {
        self.candidate.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_clears_candidate() {
        let shared = MotionShared::default();
        shared.set_connected(true);
        shared.record(MotionSample { x: 1, y: 2, adc: 3 }, true);
        assert!(shared.is_candidate());

        shared.set_connected(false);
        assert!(!shared.is_candidate());
        // The last raw sample stays visible for display.
        assert!(shared.last_sample().is_some());
    }
}
