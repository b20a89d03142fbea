use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use coughwatch_telemetry::PipelineMetrics;

use super::detector::{AxisCombine, CandidateDetector, MotionSettings};
use super::protocol;
use super::shared::MotionShared;
use crate::MotionError;

/// Where motion bytes come from. Production uses the serial link; tests
/// plug in an in-memory reader.
pub trait MotionTransport: Send {
    fn connect(&mut self) -> Result<Box<dyn Read + Send>, MotionError>;
}

/// Serial link to the external sensor, opened by device path. Reads time
/// out periodically so the thread can notice a stop request.
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
}

impl SerialTransport {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

impl MotionTransport for SerialTransport {
    fn connect(&mut self) -> Result<Box<dyn Read + Send>, MotionError> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(Duration::from_millis(500))
            .open()?;
        Ok(Box::new(port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Debug, Clone)]
pub struct MotionReaderConfig {
    /// Consecutive failed connect attempts before the link is declared
    /// failed for the rest of the session.
    pub max_connect_attempts: u32,
    pub reconnect_delay: Duration,
    pub combine: AxisCombine,
}

impl Default for MotionReaderConfig {
    fn default() -> Self {
        Self {
            max_connect_attempts: 10,
            reconnect_delay: Duration::from_secs(2),
            combine: AxisCombine::default(),
        }
    }
}

pub struct MotionReaderHandle {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

impl MotionReaderHandle {
    /// Interrupts the reader and joins its thread.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

/// Runs the sensor read loop on its own thread: an explicit state machine
/// (Disconnected → Connecting → Connected, Failed once the retry budget is
/// spent) rather than reconnect-by-recursion. A dead or absent sensor never
/// touches the audio pipeline: the shared gate just reads disconnected and
/// triggering falls back to amplitude only.
pub fn spawn(
    transport: Box<dyn MotionTransport>,
    settings: Arc<MotionSettings>,
    shared: Arc<MotionShared>,
    metrics: Arc<PipelineMetrics>,
    config: MotionReaderConfig,
) -> Result<MotionReaderHandle, MotionError> {
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name("motion-reader".to_string())
        .spawn(move || run_loop(transport, settings, shared, metrics, config, thread_stop))?;

    Ok(MotionReaderHandle { handle, stop })
}

fn run_loop(
    mut transport: Box<dyn MotionTransport>,
    settings: Arc<MotionSettings>,
    shared: Arc<MotionShared>,
    metrics: Arc<PipelineMetrics>,
    config: MotionReaderConfig,
    stop: Arc<AtomicBool>,
) {
    let mut detector = CandidateDetector::new(settings, config.combine);
    let mut state = LinkState::Disconnected;
    let mut attempts = 0u32;
    let mut link: Option<Box<dyn Read + Send>> = None;

    while !stop.load(Ordering::Relaxed) {
        state = match state {
            LinkState::Disconnected => {
                if attempts >= config.max_connect_attempts {
                    LinkState::Failed
                } else {
                    LinkState::Connecting
                }
            }
            LinkState::Connecting => {
                attempts += 1;
                match transport.connect() {
                    Ok(reader) => {
                        tracing::info!("motion link connected (attempt {})", attempts);
                        attempts = 0;
                        metrics.motion_reconnects.fetch_add(1, Ordering::Relaxed);
                        link = Some(reader);
                        LinkState::Connected
                    }
                    Err(e) => {
                        tracing::warn!(
                            "motion link connect failed (attempt {}/{}): {}",
                            attempts,
                            config.max_connect_attempts,
                            e
                        );
                        interruptible_sleep(config.reconnect_delay, &stop);
                        LinkState::Disconnected
                    }
                }
            }
            LinkState::Connected => match link.take() {
                Some(reader) => {
                    shared.set_connected(true);
                    read_lines(reader, &mut detector, &shared, &metrics, &stop);
                    shared.set_connected(false);
                    interruptible_sleep(config.reconnect_delay, &stop);
                    LinkState::Disconnected
                }
                None => LinkState::Disconnected,
            },
            LinkState::Failed => {
                tracing::error!(
                    "motion link failed after {} connect attempts; \
                     amplitude-only triggering continues without corroboration",
                    config.max_connect_attempts
                );
                break;
            }
        };
    }

    shared.set_connected(false);
    tracing::info!("motion reader thread shut down");
}

/// Reads and parses lines until the link dies or a stop is requested.
/// Malformed lines are skipped with a brief backoff; they must never take
/// the thread down.
fn read_lines(
    reader: Box<dyn Read + Send>,
    detector: &mut CandidateDetector,
    shared: &MotionShared,
    metrics: &PipelineMetrics,
    stop: &AtomicBool,
) {
    let mut lines = BufReader::new(reader);
    let mut line = String::new();

    while !stop.load(Ordering::Relaxed) {
        line.clear();
        match lines.read_line(&mut line) {
            Ok(0) => {
                tracing::warn!("motion link closed by peer");
                return;
            }
            Ok(_) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                // Idle link; poll again so stop requests stay responsive.
                continue;
            }
            Err(e) => {
                tracing::warn!("motion read error: {}", e);
                return;
            }
        }

        match protocol::parse_line(&line) {
            Ok(sample) => {
                let candidate = detector.update(sample);
                shared.record(sample, candidate);
                metrics.motion_samples.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(?sample, candidate, "motion sample");
            }
            Err(e) => {
                metrics.motion_parse_errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("skipping malformed motion line: {}", e);
                thread::sleep(Duration::from_millis(5));
            }
        }
    }
}

fn interruptible_sleep(total: Duration, stop: &AtomicBool) {
    let step = Duration::from_millis(50);
    let mut slept = Duration::ZERO;
    while slept < total && !stop.load(Ordering::Relaxed) {
        let chunk = step.min(total - slept);
        thread::sleep(chunk);
        slept += chunk;
    }
}
