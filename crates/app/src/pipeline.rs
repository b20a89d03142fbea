use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use coughwatch_audio::{AudioFrame, FrameReader, SessionRing};
use coughwatch_clip::ClipJob;
use coughwatch_foundation::PipelineEvent;
use coughwatch_motion::MotionShared;
use coughwatch_telemetry::PipelineMetrics;
use coughwatch_trigger::{peak_amplitude, TriggerEvaluator, WindowScheduler};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

/// Consumer core. Owns the session ring, trigger evaluator, and window
/// scheduler exclusively; no other task touches them, so the per-frame hot
/// path takes no locks. Each frame goes through the same sequence: ring
/// write, trigger evaluation, close check, and on closure an owned
/// linearized copy is handed to the clip channel.
pub struct CoughPipeline {
    ring: SessionRing,
    evaluator: TriggerEvaluator,
    scheduler: WindowScheduler,
    sample_rate: u32,
    clip_tx: mpsc::Sender<ClipJob>,
    events: broadcast::Sender<PipelineEvent>,
    metrics: Arc<PipelineMetrics>,
    motion_display: Option<Arc<MotionShared>>,
    accepting_triggers: bool,
}

impl CoughPipeline {
    pub fn new(
        ring: SessionRing,
        evaluator: TriggerEvaluator,
        sample_rate: u32,
        clip_tx: mpsc::Sender<ClipJob>,
        events: broadcast::Sender<PipelineEvent>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let scheduler = WindowScheduler::new(ring.frame_size(), ring.frames_per_recording());
        Self {
            ring,
            evaluator,
            scheduler,
            sample_rate,
            clip_tx,
            events,
            metrics,
            motion_display: None,
            accepting_triggers: true,
        }
    }

    /// Mirror the latest accelerometer reading into the outbound event
    /// stream, one update per audio frame.
    pub fn with_motion_display(mut self, shared: Arc<MotionShared>) -> Self {
        self.motion_display = Some(shared);
        self
    }

    /// Stops accepting new triggers; an already armed window still closes
    /// and extracts. Used during shutdown.
    pub fn stop_accepting_triggers(&mut self) {
        self.accepting_triggers = false;
    }

    pub fn handle_frame(&mut self, frame: &AudioFrame) {
        let offset = self.ring.write(frame);
        self.metrics.mark_frame();
        self.metrics.update_audio_level(&frame.samples);

        let peak = peak_amplitude(&frame.samples);
        let _ = self.events.send(PipelineEvent::Level { peak });
        if let Some(motion) = &self.motion_display {
            if let Some(sample) = motion.last_sample() {
                use coughwatch_trigger::CorroborationGate;
                let _ = self.events.send(PipelineEvent::Motion {
                    x: sample.x,
                    y: sample.y,
                    adc: sample.adc,
                    candidate: motion.is_candidate(),
                });
            }
        }

        if self.accepting_triggers
            && !self.scheduler.is_armed()
            && self.evaluator.should_trigger(peak)
        {
            if let Some(close_offset) = self.scheduler.arm(offset) {
                self.metrics.triggers_armed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    "trigger at sample offset {} (peak {}); window closes at {}",
                    offset,
                    peak,
                    close_offset
                );
                let _ = self.events.send(PipelineEvent::WindowArmed {
                    trigger_offset: offset,
                    close_offset,
                });
            }
        }

        if self.scheduler.check_close(offset) {
            self.extract();
        }
    }

    fn extract(&mut self) {
        let clip = self.ring.linearize();
        let frames = clip.frames();
        self.metrics.windows_closed.fetch_add(1, Ordering::Relaxed);

        let job = ClipJob {
            pcm: clip.pcm,
            frame_timestamps_ns: clip.frame_timestamps_ns,
            sample_rate: self.sample_rate,
        };

        // Hand off without blocking: a congested encoder loses this clip
        // the same way an encode failure would, and the consumer loop keeps
        // its cadence.
        match self.clip_tx.try_send(job) {
            Ok(()) => {
                let _ = self.events.send(PipelineEvent::WindowClosed { frames });
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.clips_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("clip queue full; dropping a {}-frame clip", frames);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("clip worker gone; dropping a {}-frame clip", frames);
            }
        }
    }
}

/// Polling driver for the consumer: pulls exact-size frames off the handoff
/// conduit in production order and feeds them through the pipeline, napping
/// briefly when the conduit runs dry.
pub struct PipelineTask;

impl PipelineTask {
    pub fn spawn(
        mut reader: FrameReader,
        mut pipeline: CoughPipeline,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("pipeline task started");
            loop {
                if !running.load(Ordering::SeqCst) {
                    // Stop requested: no new triggers, but frames the
                    // capture side already produced are still drained.
                    pipeline.stop_accepting_triggers();
                    while let Some(frame) = reader.read_frame() {
                        pipeline.handle_frame(&frame);
                    }
                    break;
                }

                match reader.read_frame() {
                    Some(frame) => pipeline.handle_frame(&frame),
                    None => {
                        if reader.source_disconnected() {
                            tracing::warn!("capture side gone; pipeline stopping");
                            break;
                        }
                        time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
            tracing::info!("pipeline task stopped");
            // Dropping the pipeline closes the clip channel; the worker
            // drains whatever is queued and exits on its own.
        })
    }
}
