use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::handoff::FrameProducer;
use coughwatch_foundation::{AudioConfig, AudioError};
use coughwatch_telemetry::PipelineMetrics;

/// Negotiated device parameters for the session. The session adopts the
/// device rate when the requested one is not supported.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle to the dedicated capture thread. The cpal stream lives entirely
/// on that thread; the handle carries only the stop and failure flags.
///
/// The audio callback does format conversion, mono downmix, and a
/// non-blocking push into the handoff conduit. Nothing else: no trigger
/// evaluation, no encoding, no I/O.
pub struct AudioCaptureThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl AudioCaptureThread {
    /// Opens the input device, starts the stream, and parks a supervisor
    /// thread on it until `stop` or a stream error. Returns the negotiated
    /// device config so the rest of the pipeline can size itself.
    ///
    /// A device that cannot be opened or configured fails the spawn; no
    /// partial session state is left behind.
    pub fn spawn(
        requested: AudioConfig,
        producer: FrameProducer,
        device_name: Option<String>,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(AtomicBool::new(false));
        let (cfg_tx, cfg_rx) = mpsc::channel();

        let thread_running = Arc::clone(&running);
        let thread_failed = Arc::clone(&failed);
        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                capture_loop(
                    requested,
                    producer,
                    device_name,
                    metrics,
                    thread_running,
                    thread_failed,
                    cfg_tx,
                );
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn capture thread: {e}")))?;

        match cfg_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(cfg)) => {
                tracing::info!(
                    "audio capture started: {} Hz, {} channel(s)",
                    cfg.sample_rate,
                    cfg.channels
                );
                Ok((
                    Self {
                        handle,
                        running,
                        failed,
                    },
                    cfg,
                ))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "capture thread did not report a device config in time".to_string(),
                ))
            }
        }
    }

    /// True once the stream has reported an error; the session is dead and
    /// restart is an explicit external action.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Stops the stream, releases the device, and joins the thread.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn capture_loop(
    requested: AudioConfig,
    producer: FrameProducer,
    device_name: Option<String>,
    metrics: Arc<PipelineMetrics>,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    cfg_tx: mpsc::Sender<Result<DeviceConfig, AudioError>>,
) {
    let opened = open_stream(
        &requested,
        device_name.as_deref(),
        producer,
        metrics,
        Arc::clone(&failed),
    );
    let stream = match opened {
        Ok((stream, cfg)) => {
            let _ = cfg_tx.send(Ok(cfg));
            stream
        }
        Err(e) => {
            let _ = cfg_tx.send(Err(e));
            return;
        }
    };

    while running.load(Ordering::SeqCst) && !failed.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(50));
    }

    if failed.load(Ordering::SeqCst) {
        tracing::error!("capture stream failed; terminating the session's read loop");
    }

    // Dropping the stream stops callbacks and releases the microphone. The
    // producer half dies with it, which the frame reader observes as
    // source_disconnected.
    drop(stream);
    tracing::info!("audio capture thread shut down");
}

fn open_stream(
    requested: &AudioConfig,
    device_name: Option<&str>,
    producer: FrameProducer,
    metrics: Arc<PipelineMetrics>,
    failed: Arc<AtomicBool>,
) -> Result<(Stream, DeviceConfig), AudioError> {
    let device = open_device(device_name)?;
    if let Ok(name) = device.name() {
        tracing::info!("selected input device: {}", name);
    }

    let (config, sample_format) = negotiate_config(&device, requested.sample_rate_hz)?;
    let device_config = DeviceConfig {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };
    if device_config.sample_rate != requested.sample_rate_hz {
        tracing::warn!(
            "device does not support {} Hz; session runs at {} Hz",
            requested.sample_rate_hz,
            device_config.sample_rate
        );
    }

    let stream = build_stream(&device, config, sample_format, producer, metrics, failed)?;
    stream.play()?;
    Ok((stream, device_config))
}

fn open_device(device_name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(name.to_string()),
            }),
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None }),
    }
}

fn negotiate_config(
    device: &cpal::Device,
    requested_rate: u32,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    // Prefer a supported range that covers the requested rate.
    if let Ok(configs) = device.supported_input_configs() {
        for range in configs {
            if range.min_sample_rate().0 <= requested_rate
                && requested_rate <= range.max_sample_rate().0
            {
                let cfg = range.with_sample_rate(cpal::SampleRate(requested_rate));
                let sample_format = cfg.sample_format();
                return Ok((
                    StreamConfig {
                        channels: cfg.channels(),
                        sample_rate: cfg.sample_rate(),
                        buffer_size: cpal::BufferSize::Default,
                    },
                    sample_format,
                ));
            }
        }
    }

    // Fall back to the device default; the session adopts its rate.
    let default_config = device.default_input_config()?;
    Ok((
        StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        },
        default_config.sample_format(),
    ))
}

fn build_stream(
    device: &cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    producer: FrameProducer,
    metrics: Arc<PipelineMetrics>,
    failed: Arc<AtomicBool>,
) -> Result<Stream, AudioError> {
    let channels = config.channels as usize;

    let err_metrics = Arc::clone(&metrics);
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("audio stream error: {}", err);
        err_metrics.capture_errors.fetch_add(1, Ordering::Relaxed);
        failed.store(true, Ordering::SeqCst);
    };

    // Owned by whichever callback closure gets built; scratch buffers are
    // reused so the callback never allocates after warm-up.
    let mut producer = producer;
    let mut mono: Vec<i16> = Vec::new();
    let mut push = move |i16_data: &[i16]| {
        downmix_to_mono(i16_data, channels, &mut mono);
        match producer.write(&mono) {
            Ok(_) => {
                metrics.capture_frames.fetch_add(1, Ordering::Relaxed);
            }
            Err(()) => {
                metrics.capture_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| push(data),
            err_fn,
            None,
        )?,
        SampleFormat::F32 => {
            let mut converted: Vec<i16> = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &_| {
                    converted.clear();
                    converted.reserve(data.len());
                    for &s in data {
                        converted.push((s.clamp(-1.0, 1.0) * 32767.0).round() as i16);
                    }
                    push(&converted);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut converted: Vec<i16> = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &_| {
                    converted.clear();
                    converted.reserve(data.len());
                    // Recenter unsigned [0, 65535] onto [-32768, 32767].
                    for &s in data {
                        converted.push((s as i32 - 32768) as i16);
                    }
                    push(&converted);
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    Ok(stream)
}

fn downmix_to_mono(samples: &[i16], channels: usize, out: &mut Vec<i16>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(samples);
        return;
    }
    out.reserve(samples.len() / channels);
    for chunk in samples.chunks_exact(channels) {
        let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
        out.push((sum / channels as i32) as i16);
    }
}
