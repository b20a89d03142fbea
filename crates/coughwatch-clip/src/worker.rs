use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use coughwatch_foundation::{Examination, PipelineEvent};
use coughwatch_telemetry::PipelineMetrics;
use coughwatch_upload::UploadSink;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::{clip_file_name, ClipError, ClipFormat, WavFileWriter};

/// One extraction's worth of audio. Owned outright: the live ring keeps
/// recording while this is encoded, and dropping the job releases the
/// temporary PCM copy.
#[derive(Debug)]
pub struct ClipJob {
    /// Little-endian 16-bit PCM, oldest frame first.
    pub pcm: Vec<u8>,
    /// Capture timestamp of each frame, oldest first.
    pub frame_timestamps_ns: Vec<u64>,
    pub sample_rate: u32,
}

/// Encodes queued clips and hands the finished files to the upload sink.
/// Runs decoupled from the consumer loop so encoding latency never
/// backpressures frame processing; per-clip failures are logged and the
/// worker moves on.
pub struct ClipWorker {
    jobs: mpsc::Receiver<ClipJob>,
    base_dir: PathBuf,
    session_id: String,
    format: ClipFormat,
    examination: Examination,
    sink: Arc<dyn UploadSink>,
    events: broadcast::Sender<PipelineEvent>,
    metrics: Arc<PipelineMetrics>,
}

impl ClipWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: mpsc::Receiver<ClipJob>,
        base_dir: PathBuf,
        session_id: String,
        format: ClipFormat,
        examination: Examination,
        sink: Arc<dyn UploadSink>,
        events: broadcast::Sender<PipelineEvent>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            jobs,
            base_dir,
            session_id,
            format,
            examination,
            sink,
            events,
            metrics,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Drains jobs until the pipeline closes the channel. Closing still
    /// lets every job already queued finish, so a detected cough is never
    /// lost to shutdown.
    async fn run(mut self) {
        tracing::info!("clip worker started");
        while let Some(job) = self.jobs.recv().await {
            self.handle_job(job).await;
        }
        tracing::info!("clip worker drained and stopped");
    }

    async fn handle_job(&mut self, job: ClipJob) {
        match self.encode(&job) {
            Ok(path) => {
                self.metrics.clips_encoded.fetch_add(1, Ordering::Relaxed);
                let _ = self.events.send(PipelineEvent::ClipSaved { path: path.clone() });
                self.upload(path).await;
            }
            Err(e) => {
                // This clip is lost; the pipeline keeps capturing.
                self.metrics.clips_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("failed to encode clip: {}", e);
                let _ = self.events.send(PipelineEvent::ClipFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn encode(&self, job: &ClipJob) -> Result<PathBuf, ClipError> {
        if job.pcm.is_empty() {
            return Err(ClipError::Empty);
        }

        let name = clip_file_name(&self.session_id, self.format, Utc::now());
        let path = self.base_dir.join(name);
        match self.format {
            ClipFormat::Wav => {
                let mut writer = WavFileWriter::create(&path, job.sample_rate)?;
                writer.write_pcm(&job.pcm)?;
                writer.finalize()?;
            }
        }

        tracing::info!(
            "wrote {} ({} frames, ~{} ms)",
            path.display(),
            job.frame_timestamps_ns.len(),
            clip_duration_ms(job)
        );
        Ok(path)
    }

    async fn upload(&self, path: PathBuf) {
        match self.sink.upload(&path, &self.examination).await {
            Ok(()) => {
                self.metrics.uploads_ok.fetch_add(1, Ordering::Relaxed);
                let _ = self.events.send(PipelineEvent::Uploaded { path });
            }
            Err(e) => {
                self.metrics.uploads_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("upload failed for {}: {}", path.display(), e);
                let _ = self.events.send(PipelineEvent::UploadFailed {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn clip_duration_ms(job: &ClipJob) -> u64 {
    match (
        job.frame_timestamps_ns.first(),
        job.frame_timestamps_ns.last(),
    ) {
        (Some(&first), Some(&last)) if last > first => {
            let spans = job.frame_timestamps_ns.len() as u64 - 1;
            let frame_ns = (last - first) / spans;
            (last - first + frame_ns) / 1_000_000
        }
        _ => (job.pcm.len() as u64 / 2) * 1000 / job.sample_rate.max(1) as u64,
    }
}
