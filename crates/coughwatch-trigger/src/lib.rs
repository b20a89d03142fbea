pub mod evaluator;
pub mod level;
pub mod settings;
pub mod window;

pub use evaluator::{CorroborationGate, TriggerEvaluator};
pub use level::peak_amplitude;
pub use settings::TriggerSettings;
pub use window::WindowScheduler;
