pub mod detector;
pub mod protocol;
pub mod shared;
pub mod supervisor;

pub use detector::{AxisCombine, CandidateDetector, MotionSettings};
pub use protocol::{MotionSample, ParseError};
pub use shared::MotionShared;
pub use supervisor::{
    MotionReaderConfig, MotionReaderHandle, MotionTransport, SerialTransport,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionError {
    #[error("serial open failed: {0}")]
    Serial(#[from] serialport::Error),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("thread spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}
