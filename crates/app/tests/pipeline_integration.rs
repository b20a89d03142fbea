//! Drives the consumer core with synthetic frames: trigger edge
//! sensitivity, window placement, motion gating, exactly-once extraction,
//! and the full frame-to-WAV-to-sink path.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use coughwatch_app::pipeline::CoughPipeline;
use coughwatch_audio::{AudioFrame, SessionRing};
use coughwatch_clip::{ClipFormat, ClipJob, ClipWorker};
use coughwatch_foundation::Examination;
use coughwatch_motion::{MotionSample, MotionShared};
use coughwatch_telemetry::PipelineMetrics;
use coughwatch_trigger::{TriggerEvaluator, TriggerSettings};
use coughwatch_upload::{UploadError, UploadSink};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

const THRESHOLD: i32 = 7000;
const QUIET: i16 = 100;
const LOUD: i16 = 20_000;

struct Harness {
    pipeline: CoughPipeline,
    clip_rx: mpsc::Receiver<ClipJob>,
    metrics: Arc<PipelineMetrics>,
    frame_size: usize,
    next_ts: u64,
}

impl Harness {
    fn new(frames_per: usize, frame_size: usize, gate: Option<Arc<MotionShared>>) -> Self {
        // Pick a rate that yields exactly `frames_per` frames per second of
        // ring.
        let sample_rate = (frames_per * frame_size) as u32;
        let ring = SessionRing::new(sample_rate, 1, frame_size);
        assert_eq!(ring.frames_per_recording(), frames_per);

        let mut evaluator = TriggerEvaluator::new(TriggerSettings::new(THRESHOLD));
        if let Some(gate) = gate {
            evaluator = evaluator.with_gate(gate);
        }

        let metrics = Arc::new(PipelineMetrics::default());
        let (events, _) = broadcast::channel(1024);
        let (clip_tx, clip_rx) = mpsc::channel(8);
        let pipeline = CoughPipeline::new(
            ring,
            evaluator,
            sample_rate,
            clip_tx,
            events,
            metrics.clone(),
        );

        Self {
            pipeline,
            clip_rx,
            metrics,
            frame_size,
            next_ts: 0,
        }
    }

    fn push(&mut self, level: i16) {
        self.push_samples(vec![level; self.frame_size]);
    }

    fn push_samples(&mut self, samples: Vec<i16>) {
        self.next_ts += 1_000_000;
        self.pipeline.handle_frame(&AudioFrame {
            samples,
            timestamp_ns: self.next_ts,
        });
    }

    fn triggers(&self) -> u64 {
        self.metrics.triggers_armed.load(Ordering::Relaxed)
    }

    fn take_clips(&mut self) -> Vec<ClipJob> {
        let mut clips = Vec::new();
        while let Ok(job) = self.clip_rx.try_recv() {
            clips.push(job);
        }
        clips
    }
}

#[test]
fn loud_burst_arms_once_and_extracts_a_centered_clip() {
    // 8-frame ring: the window closes 8/2 - 1 = 3 frames after the trigger.
    let mut h = Harness::new(8, 8, None);

    for _ in 0..8 {
        h.push(QUIET);
    }
    // Three consecutive loud frames: a single trigger. The burst must end
    // before the window closes or the tail would arm a second one; with
    // this tiny ring that is 3 frames, in production it is half the ring.
    for _ in 0..3 {
        h.push(LOUD);
    }
    for _ in 0..8 {
        h.push(QUIET);
    }

    assert_eq!(h.triggers(), 1);
    let clips = h.take_clips();
    assert_eq!(clips.len(), 1);
    // The ring had fully wrapped, so the clip is one whole buffer.
    assert_eq!(clips[0].frame_timestamps_ns.len(), 8);
}

#[test]
fn clip_content_is_chronological_across_wraparound() {
    let mut h = Harness::new(4, 4, None);

    // Frames tagged 1..=6, all quiet; then a loud frame tagged 7.
    for tag in 1..=6i16 {
        h.push_samples(vec![tag; 4]);
    }
    let mut loud = vec![7i16; 4];
    loud[0] = LOUD;
    h.push_samples(loud);
    // Window closes (6 + 1) % 4 = frame idx 1 of the next cycle; feed the
    // closing frame.
    h.push_samples(vec![8i16; 4]);

    let clips = h.take_clips();
    assert_eq!(clips.len(), 1);

    let samples: Vec<i16> = clips[0]
        .pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    // Oldest surviving frame first: tags 5, 6, 7(loud), 8.
    assert_eq!(&samples[..4], &[5, 5, 5, 5]);
    assert_eq!(&samples[4..8], &[6, 6, 6, 6]);
    assert_eq!(samples[8], LOUD);
    assert_eq!(&samples[12..], &[8, 8, 8, 8]);
    // Timestamps stay parallel to the frames.
    assert_eq!(
        clips[0].frame_timestamps_ns,
        vec![5_000_000, 6_000_000, 7_000_000, 8_000_000]
    );
}

#[test]
fn spaced_triggers_extract_exactly_once_each() {
    let frames_per = 8;
    let mut h = Harness::new(frames_per, 8, None);

    let bursts = 6;
    for _ in 0..bursts {
        h.push(LOUD);
        // Well over one full buffer of quiet between events.
        for _ in 0..frames_per + 3 {
            h.push(QUIET);
        }
    }

    assert_eq!(h.triggers(), bursts as u64);
    assert_eq!(h.take_clips().len(), bursts);
}

#[test]
fn motion_gate_suppresses_uncorroborated_triggers() {
    let shared = Arc::new(MotionShared::default());
    shared.set_connected(true);
    shared.record(MotionSample { x: 1, y: 1, adc: 1 }, false);

    let mut h = Harness::new(8, 8, Some(shared.clone()));

    // Loud but no motion: suppressed.
    for _ in 0..4 {
        h.push(LOUD);
    }
    assert_eq!(h.triggers(), 0);

    // Motion agrees: the next loud frame arms.
    shared.record(MotionSample { x: 9, y: 1, adc: 9 }, true);
    h.push(LOUD);
    assert_eq!(h.triggers(), 1);
}

#[test]
fn partial_ring_extracts_only_populated_frames() {
    // Trigger before the ring ever fills.
    let mut h = Harness::new(8, 8, None);

    h.push(QUIET);
    h.push(LOUD); // frame idx 1, closes at idx 1 + 3 = 4
    h.push(QUIET);
    h.push(QUIET);
    h.push(QUIET);

    let clips = h.take_clips();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].frame_timestamps_ns.len(), 5);
}

#[test]
fn no_triggers_accepted_after_stop() {
    let mut h = Harness::new(8, 8, None);
    h.pipeline.stop_accepting_triggers();
    for _ in 0..10 {
        h.push(LOUD);
    }
    assert_eq!(h.triggers(), 0);
    assert!(h.take_clips().is_empty());
}

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

#[tokio::test]
async fn frames_to_playable_wav_and_upload() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let metrics = Arc::new(PipelineMetrics::default());
    let (events, _keep) = broadcast::channel(1024);
    let (clip_tx, clip_rx) = mpsc::channel(8);

    let frame_size = 8;
    let sample_rate = 64u32;
    let ring = SessionRing::new(sample_rate, 1, frame_size);
    let evaluator = TriggerEvaluator::new(TriggerSettings::new(THRESHOLD));
    let mut pipeline = CoughPipeline::new(
        ring,
        evaluator,
        sample_rate,
        clip_tx,
        events.clone(),
        metrics.clone(),
    );

    let worker = ClipWorker::new(
        clip_rx,
        dir.path().to_path_buf(),
        "it".to_string(),
        ClipFormat::Wav,
        Examination {
            id: 7,
            name: "integration".to_string(),
        },
        sink.clone(),
        events,
        metrics.clone(),
    );
    let worker_handle = worker.spawn();

    // Fill the ring, trigger, and run the window to closure.
    let mut ts = 0u64;
    let mut push = |pipeline: &mut CoughPipeline, level: i16| {
        ts += 1_000_000;
        pipeline.handle_frame(&AudioFrame {
            samples: vec![level; frame_size],
            timestamp_ns: ts,
        });
    };
    for _ in 0..8 {
        push(&mut pipeline, QUIET);
    }
    push(&mut pipeline, LOUD);
    for _ in 0..7 {
        push(&mut pipeline, QUIET);
    }

    // Closing the channel lets the worker drain and exit.
    drop(pipeline);
    worker_handle.await.unwrap();

    assert_eq!(metrics.windows_closed.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.clips_encoded.load(Ordering::Relaxed), 1);

    let uploads = sink.uploads.lock();
    assert_eq!(uploads.len(), 1);
    let (path, examination) = &uploads[0];
    assert_eq!(examination.id, 7);

    let mut reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, sample_rate);
    assert_eq!(spec.bits_per_sample, 16);
    // One full ring of audio made it into the file.
    assert_eq!(reader.duration() as usize, 8 * frame_size);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert!(samples.contains(&LOUD));
}
