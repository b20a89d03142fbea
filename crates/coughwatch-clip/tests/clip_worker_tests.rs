//! Clip worker behavior: encode + hand off to the sink, per-clip failure
//! isolation, and drain-on-close.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use coughwatch_clip::{ClipFormat, ClipJob, ClipWorker};
use coughwatch_foundation::{Examination, PipelineEvent};
use coughwatch_telemetry::PipelineMetrics;
use coughwatch_upload::{UploadError, UploadSink};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

#[derive(Default)]
struct RecordingSink {
    uploads: Mutex<Vec<(PathBuf, Examination)>>,
}

#[async_trait]
impl UploadSink for RecordingSink {
    async fn upload(&self, file: &Path, examination: &Examination) -> Result<(), UploadError> {
        self.uploads
            .lock()
            .push((file.to_path_buf(), examination.clone()));
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl UploadSink for FailingSink {
    async fn upload(&self, _file: &Path, _examination: &Examination) -> Result<(), UploadError> {
        Err(UploadError::Status(503))
    }
}

fn job(samples: &[i16], sample_rate: u32) -> ClipJob {
    ClipJob {
        pcm: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        frame_timestamps_ns: vec![1_000_000; 1],
        sample_rate,
    }
}

#[tokio::test]
async fn encodes_and_uploads_with_examination_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let metrics = Arc::new(PipelineMetrics::default());
    let (events, mut events_rx) = broadcast::channel(16);
    let (tx, rx) = mpsc::channel(4);

    let worker = ClipWorker::new(
        rx,
        dir.path().to_path_buf(),
        "dev0".to_string(),
        ClipFormat::Wav,
        Examination {
            id: 114,
            name: "TEST".to_string(),
        },
        sink.clone(),
        events,
        metrics.clone(),
    );
    let handle = worker.spawn();

    tx.send(job(&[1, -2, 3, -4], 48_000)).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(metrics.clips_encoded.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.uploads_ok.load(Ordering::Relaxed), 1);

    let uploads = sink.uploads.lock();
    assert_eq!(uploads.len(), 1);
    let (path, examination) = &uploads[0];
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("sample_dev0_"));
    assert!(path.extension().unwrap() == "wav");
    assert_eq!(examination.id, 114);
    assert_eq!(examination.name, "TEST");

    // File is a playable WAV containing exactly the job's samples.
    let mut reader = hound::WavReader::open(path).unwrap();
    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(decoded, vec![1, -2, 3, -4]);

    // Lifecycle events went out in order.
    assert!(matches!(events_rx.try_recv(), Ok(PipelineEvent::ClipSaved { .. })));
    assert!(matches!(events_rx.try_recv(), Ok(PipelineEvent::Uploaded { .. })));
}

#[tokio::test]
async fn encode_failure_does_not_stop_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let metrics = Arc::new(PipelineMetrics::default());
    let (events, _keep_alive) = broadcast::channel(16);
    let (tx, rx) = mpsc::channel(4);

    let worker = ClipWorker::new(
        rx,
        dir.path().to_path_buf(),
        "dev0".to_string(),
        ClipFormat::Wav,
        Examination::default(),
        sink.clone(),
        events,
        metrics.clone(),
    );
    let handle = worker.spawn();

    // An empty clip cannot be encoded; the next job must still succeed.
    tx.send(ClipJob {
        pcm: vec![],
        frame_timestamps_ns: vec![],
        sample_rate: 48_000,
    })
    .await
    .unwrap();
    tx.send(job(&[7, 7], 48_000)).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(metrics.clips_failed.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.clips_encoded.load(Ordering::Relaxed), 1);
    assert_eq!(sink.uploads.lock().len(), 1);
}

#[tokio::test]
async fn upload_failure_is_counted_but_file_remains() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = Arc::new(PipelineMetrics::default());
    let (events, _keep_alive) = broadcast::channel(16);
    let (tx, rx) = mpsc::channel(4);

    let worker = ClipWorker::new(
        rx,
        dir.path().to_path_buf(),
        "dev0".to_string(),
        ClipFormat::Wav,
        Examination::default(),
        Arc::new(FailingSink),
        events,
        metrics.clone(),
    );
    let handle = worker.spawn();

    tx.send(job(&[5; 16], 44_100)).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    assert_eq!(metrics.uploads_failed.load(Ordering::Relaxed), 1);
    // Local persistence succeeded even though the upload did not.
    let wavs: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(wavs.len(), 1);
}
