use std::path::Path;

use async_trait::async_trait;
use coughwatch_foundation::Examination;

use crate::{UploadError, UploadSink};

/// Sink for offline or local-only operation: clips stay on disk and the
/// upload step is a logged no-op.
#[derive(Debug, Default)]
pub struct NoopUploadSink;

#[async_trait]
impl UploadSink for NoopUploadSink {
    async fn upload(&self, file: &Path, examination: &Examination) -> Result<(), UploadError> {
        tracing::debug!(
            "upload disabled; keeping {} locally (examination {} \"{}\")",
            file.display(),
            examination.id,
            examination.name
        );
        Ok(())
    }
}
