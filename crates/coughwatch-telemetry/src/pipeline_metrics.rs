use parking_lot::RwLock;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared counters for cross-thread pipeline monitoring. Every field is
/// independently atomic; readers get a cheap, possibly-torn snapshot, which
/// is fine for logging and display.
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak: Arc<AtomicI32>,
    pub current_rms: Arc<AtomicU64>, // RMS * 1000 for precision

    // Capture side
    pub capture_frames: Arc<AtomicU64>,
    pub capture_dropped: Arc<AtomicU64>,
    pub capture_errors: Arc<AtomicU64>,

    // Consumer side
    pub frames_processed: Arc<AtomicU64>,
    pub triggers_armed: Arc<AtomicU64>,
    pub windows_closed: Arc<AtomicU64>,

    // Clip production
    pub clips_encoded: Arc<AtomicU64>,
    pub clips_failed: Arc<AtomicU64>,
    pub uploads_ok: Arc<AtomicU64>,
    pub uploads_failed: Arc<AtomicU64>,

    // Motion side
    pub motion_samples: Arc<AtomicU64>,
    pub motion_parse_errors: Arc<AtomicU64>,
    pub motion_reconnects: Arc<AtomicU64>,

    pub last_frame_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak: Arc::new(AtomicI32::new(0)),
            current_rms: Arc::new(AtomicU64::new(0)),
            capture_frames: Arc::new(AtomicU64::new(0)),
            capture_dropped: Arc::new(AtomicU64::new(0)),
            capture_errors: Arc::new(AtomicU64::new(0)),
            frames_processed: Arc::new(AtomicU64::new(0)),
            triggers_armed: Arc::new(AtomicU64::new(0)),
            windows_closed: Arc::new(AtomicU64::new(0)),
            clips_encoded: Arc::new(AtomicU64::new(0)),
            clips_failed: Arc::new(AtomicU64::new(0)),
            uploads_ok: Arc::new(AtomicU64::new(0)),
            uploads_failed: Arc::new(AtomicU64::new(0)),
            motion_samples: Arc::new(AtomicU64::new(0)),
            motion_parse_errors: Arc::new(AtomicU64::new(0)),
            motion_reconnects: Arc::new(AtomicU64::new(0)),
            last_frame_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl PipelineMetrics {
    pub fn update_audio_level(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let peak = samples
            .iter()
            .map(|&s| (s as i32).abs())
            .max()
            .unwrap_or(0);
        self.current_peak.store(peak, Ordering::Relaxed);

        let sum: i64 = samples.iter().map(|&s| s as i64 * s as i64).sum();
        let rms = ((sum as f64 / samples.len() as f64).sqrt() * 1000.0) as u64;
        self.current_rms.store(rms, Ordering::Relaxed);
    }

    pub fn mark_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        *self.last_frame_time.write() = Some(Instant::now());
    }
}
