mod http;
mod noop;

pub use http::HttpUploadSink;
pub use noop::NoopUploadSink;

use std::path::Path;

use async_trait::async_trait;
use coughwatch_foundation::Examination;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected upload with status {0}")]
    Status(u16),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for finished clip files. The pipeline's responsibility ends
/// at local file production: sinks are best-effort, and a failure is
/// reported but never retried or queued.
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn upload(&self, file: &Path, examination: &Examination) -> Result<(), UploadError>;
}
