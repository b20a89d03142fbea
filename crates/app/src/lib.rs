pub mod pipeline;
pub mod runtime;

pub use pipeline::{CoughPipeline, PipelineTask};
pub use runtime::{start, RecorderHandle, RecorderOptions, UploadOptions};
