use std::sync::Arc;

use super::settings::TriggerSettings;

/// Secondary corroboration signal. When a motion device is wired in, a loud
/// frame only triggers while the device currently agrees it saw cough-like
/// motion.
pub trait CorroborationGate: Send + Sync {
    /// Whether the device behind the gate is currently delivering samples.
    fn is_connected(&self) -> bool;
    /// Latest candidate verdict. Not latched: reflects only the newest
    /// comparison.
    fn is_candidate(&self) -> bool;
}

/// Per-frame trigger decision: peak amplitude over the live threshold,
/// optionally corroborated by motion.
///
/// The evaluator is stateless; edge sensitivity comes from the caller only
/// consulting it while no extraction window is armed, so K consecutive loud
/// frames arm exactly one window.
pub struct TriggerEvaluator {
    settings: Arc<TriggerSettings>,
    gate: Option<Arc<dyn CorroborationGate>>,
}

impl TriggerEvaluator {
    pub fn new(settings: Arc<TriggerSettings>) -> Self {
        Self {
            settings,
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn CorroborationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn should_trigger(&self, peak_amplitude: i32) -> bool {
        if peak_amplitude <= self.settings.sound_threshold() {
            return false;
        }
        match &self.gate {
            // A connected motion device must agree, which suppresses
            // ambient noise without concurrent motion.
            Some(gate) if gate.is_connected() => gate.is_candidate(),
            // No gate, or the device is away: amplitude alone decides.
            _ => true,
        }
    }
}
