use std::path::PathBuf;

/// Outbound notifications from the pipeline. Display and diagnostic layers
/// subscribe via a broadcast receiver; the pipeline never calls into them.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Peak absolute amplitude of the frame just processed.
    Level { peak: i32 },
    /// Latest accelerometer reading and the current candidate verdict.
    Motion {
        x: i32,
        y: i32,
        adc: i32,
        candidate: bool,
    },
    /// A trigger armed an extraction window.
    WindowArmed {
        trigger_offset: usize,
        close_offset: usize,
    },
    /// The window closed and a clip was handed to the encoder.
    WindowClosed { frames: usize },
    ClipSaved { path: PathBuf },
    ClipFailed { reason: String },
    Uploaded { path: PathBuf },
    UploadFailed { path: PathBuf, reason: String },
}
