use std::path::Path;

use async_trait::async_trait;
use coughwatch_foundation::Examination;

use crate::{UploadError, UploadSink};

/// Multipart POST to the clip collection service. Each request carries the
/// examination id and label as form fields, the clip as the `file_to` part,
/// and a `token` credential in the Authorization header.
pub struct HttpUploadSink {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpUploadSink {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl UploadSink for HttpUploadSink {
    async fn upload(&self, file: &Path, examination: &Examination) -> Result<(), UploadError> {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.wav".to_string());
        let bytes = tokio::fs::read(file).await?;
        let size = bytes.len();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("id_examination", examination.id.to_string())
            .text("exam_name", examination.name.clone())
            .part("file_to", part);

        let response = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", self.token),
            )
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }
        tracing::info!(
            "uploaded {} ({} bytes, status {})",
            file.display(),
            size,
            status.as_u16()
        );
        Ok(())
    }
}
