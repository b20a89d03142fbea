use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use coughwatch_audio::{AudioCaptureThread, FrameReader, HandoffRing, SessionRing};
use coughwatch_clip::{ClipFormat, ClipWorker};
use coughwatch_foundation::{
    AppError, AudioConfig, Examination, PipelineEvent, SessionState, StateManager,
};
use coughwatch_motion::{
    supervisor as motion, AxisCombine, MotionReaderConfig, MotionReaderHandle, MotionSettings,
    MotionShared, SerialTransport,
};
use coughwatch_telemetry::PipelineMetrics;
use coughwatch_trigger::{TriggerEvaluator, TriggerSettings};
use coughwatch_upload::{HttpUploadSink, NoopUploadSink, UploadSink};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::pipeline::{CoughPipeline, PipelineTask};

/// Options for one recording session. Recorder variants (with or without
/// motion corroboration, with or without upload) are all configuration,
/// not separate implementations.
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    pub audio: AudioConfig,
    /// Input device name; None uses the system default microphone.
    pub device: Option<String>,
    pub sound_threshold: i32,
    /// Serial path of the accelerometer peripheral; None runs
    /// amplitude-only.
    pub motion_device: Option<String>,
    pub motion_baud: u32,
    pub motion_percent: u32,
    pub motion_combine: AxisCombine,
    pub base_dir: PathBuf,
    pub session_id: String,
    pub examination: Examination,
    /// None keeps clips local-only.
    pub upload: Option<UploadOptions>,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub endpoint: String,
    pub token: String,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            device: None,
            sound_threshold: 7000,
            motion_device: None,
            motion_baud: 9600,
            motion_percent: 35,
            motion_combine: AxisCombine::default(),
            base_dir: PathBuf::from("clips"),
            session_id: "0".to_string(),
            examination: Examination::default(),
            upload: None,
        }
    }
}

/// Handle to a running recording session.
pub struct RecorderHandle {
    pub metrics: Arc<PipelineMetrics>,
    events_tx: broadcast::Sender<PipelineEvent>,
    trigger_settings: Arc<TriggerSettings>,
    motion_settings: Arc<MotionSettings>,
    state: StateManager,
    running: Arc<AtomicBool>,
    capture: AudioCaptureThread,
    pipeline_handle: JoinHandle<()>,
    clip_worker_handle: JoinHandle<()>,
    motion_handle: Option<MotionReaderHandle>,
}

impl RecorderHandle {
    /// Subscribe to outbound pipeline events (multiple subscribers are
    /// supported).
    pub fn subscribe_events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events_tx.subscribe()
    }

    /// Takes effect on the next evaluated frame.
    pub fn set_sound_threshold(&self, value: i32) {
        self.trigger_settings.set_sound_threshold(value);
    }

    /// Takes effect on the next motion sample.
    pub fn set_motion_percent(&self, value: u32) {
        self.motion_settings.set_percent_threshold(value);
    }

    /// True once the capture stream has died; the session should be shut
    /// down and restarted explicitly.
    pub fn capture_failed(&self) -> bool {
        self.capture.has_failed()
    }

    /// Ordered teardown: quiesce the microphone, let the consumer drain the
    /// conduit, let already-queued clips finish encoding and uploading,
    /// then interrupt the motion thread.
    pub async fn shutdown(self) -> Result<(), AppError> {
        self.state.transition(SessionState::Stopping)?;

        // Stop the source first; this releases the device and drops the
        // producer half of the conduit.
        self.capture.stop();

        // The consumer stops accepting triggers, drains, and exits.
        self.running.store(false, Ordering::SeqCst);
        let _ = self.pipeline_handle.await;

        // The pipeline's death closed the clip channel; in-flight clips
        // complete rather than being cancelled.
        let _ = self.clip_worker_handle.await;

        if let Some(motion) = self.motion_handle {
            motion.stop();
        }

        self.state.transition(SessionState::Stopped)?;
        Ok(())
    }
}

/// Starts a recording session. Must be called from within a tokio runtime;
/// a failed start leaves nothing running.
pub fn start(opts: RecorderOptions) -> Result<RecorderHandle, AppError> {
    opts.audio.validate()?;
    std::fs::create_dir_all(&opts.base_dir)
        .map_err(|e| AppError::Config(format!("cannot create {}: {e}", opts.base_dir.display())))?;

    let state = StateManager::new();
    let metrics = Arc::new(PipelineMetrics::default());
    let (events_tx, _) = broadcast::channel::<PipelineEvent>(256);

    // Producer -> consumer conduit sized for about a second of audio so a
    // scheduling hiccup on the consumer never costs frames.
    let conduit_capacity = (opts.audio.sample_rate_hz as usize).max(opts.audio.frame_size_samples * 8);
    let (producer, consumer) = HandoffRing::new(conduit_capacity).split();

    let (capture, device_cfg) = AudioCaptureThread::spawn(
        opts.audio,
        producer,
        opts.device.clone(),
        Arc::clone(&metrics),
    )?;

    // The session runs at the rate the device actually delivers.
    let session_audio = AudioConfig {
        sample_rate_hz: device_cfg.sample_rate,
        ..opts.audio
    };
    if let Err(e) = session_audio.validate() {
        capture.stop();
        return Err(e);
    }

    let trigger_settings = TriggerSettings::new(opts.sound_threshold);
    let motion_settings = MotionSettings::new(opts.motion_percent);
    let motion_shared = Arc::new(MotionShared::default());

    let motion_handle = match &opts.motion_device {
        Some(path) => {
            let transport = Box::new(SerialTransport::new(path.clone(), opts.motion_baud));
            let config = MotionReaderConfig {
                combine: opts.motion_combine,
                ..Default::default()
            };
            match motion::spawn(
                transport,
                Arc::clone(&motion_settings),
                Arc::clone(&motion_shared),
                Arc::clone(&metrics),
                config,
            ) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(
                        "motion reader unavailable ({}); continuing amplitude-only",
                        e
                    );
                    None
                }
            }
        }
        None => None,
    };

    let mut evaluator = TriggerEvaluator::new(Arc::clone(&trigger_settings));
    if motion_handle.is_some() {
        evaluator = evaluator.with_gate(motion_shared.clone());
    }

    // A fresh ring per session; nothing leaks across sessions.
    let ring = SessionRing::new(
        session_audio.sample_rate_hz,
        session_audio.record_seconds,
        session_audio.frame_size_samples,
    );
    let reader = FrameReader::new(
        consumer,
        session_audio.frame_size_samples,
        session_audio.sample_rate_hz,
    );

    let (clip_tx, clip_rx) = mpsc::channel(8);
    let sink: Arc<dyn UploadSink> = match &opts.upload {
        Some(upload) => Arc::new(HttpUploadSink::new(
            upload.endpoint.clone(),
            upload.token.clone(),
        )),
        None => Arc::new(NoopUploadSink),
    };
    let clip_worker_handle = ClipWorker::new(
        clip_rx,
        opts.base_dir.clone(),
        opts.session_id.clone(),
        ClipFormat::Wav,
        opts.examination.clone(),
        sink,
        events_tx.clone(),
        Arc::clone(&metrics),
    )
    .spawn();

    let mut pipeline = CoughPipeline::new(
        ring,
        evaluator,
        session_audio.sample_rate_hz,
        clip_tx,
        events_tx.clone(),
        Arc::clone(&metrics),
    );
    if motion_handle.is_some() {
        pipeline = pipeline.with_motion_display(motion_shared);
    }

    let running = Arc::new(AtomicBool::new(true));
    let pipeline_handle = PipelineTask::spawn(reader, pipeline, Arc::clone(&running));

    state.transition(SessionState::Running)?;
    tracing::info!(
        "recording session started: {} Hz, {}-sample frames, {}s ring, threshold {}",
        session_audio.sample_rate_hz,
        session_audio.frame_size_samples,
        session_audio.record_seconds,
        opts.sound_threshold
    );

    Ok(RecorderHandle {
        metrics,
        events_tx,
        trigger_settings,
        motion_settings,
        state,
        running,
        capture,
        pipeline_handle,
        clip_worker_handle,
        motion_handle,
    })
}
