pub mod config;
pub mod error;
pub mod events;
pub mod shutdown;
pub mod state;

pub use config::{AudioConfig, Examination};
pub use error::{AppError, AudioError};
pub use events::PipelineEvent;
pub use shutdown::{ShutdownGuard, ShutdownHandler};
pub use state::{SessionState, StateManager};
