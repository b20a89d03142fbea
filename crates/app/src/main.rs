use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;

use coughwatch_app::runtime::{self, RecorderOptions, UploadOptions};
use coughwatch_foundation::{AudioConfig, Examination, ShutdownHandler};
use coughwatch_motion::AxisCombine;

#[derive(Parser, Debug)]
#[command(name = "coughwatch", version, about = "Continuous cough clip recorder")]
struct Cli {
    /// Input device name (default: system default microphone)
    #[arg(long, env = "COUGHWATCH_DEVICE")]
    device: Option<String>,

    #[arg(long, default_value_t = 48_000, env = "COUGHWATCH_SAMPLE_RATE")]
    sample_rate: u32,

    /// Samples per pipeline frame
    #[arg(long, default_value_t = 1024)]
    frame_size: usize,

    /// Seconds of audio kept around each detected cough
    #[arg(long, default_value_t = 6)]
    record_seconds: u32,

    /// Peak amplitude that arms an extraction window
    #[arg(long, default_value_t = 7000, env = "COUGHWATCH_SOUND_THRESHOLD")]
    sound_threshold: i32,

    /// Serial path of the accelerometer peripheral, e.g. /dev/rfcomm0
    #[arg(long, env = "COUGHWATCH_MOTION_DEVICE")]
    motion_device: Option<String>,

    #[arg(long, default_value_t = 9600)]
    motion_baud: u32,

    /// Percentage change on the accelerometer channels that counts as motion
    #[arg(long, default_value_t = 35)]
    motion_percent: u32,

    /// How accelerometer channels combine: lateral-and-adc, any, all
    #[arg(long, default_value = "lateral-and-adc")]
    motion_combine: String,

    /// Directory finished clips are written to
    #[arg(long, default_value = "clips")]
    base_dir: PathBuf,

    /// Upload endpoint; omit to keep clips local-only
    #[arg(long, env = "COUGHWATCH_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer credential for the upload endpoint
    #[arg(long, env = "COUGHWATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, default_value_t = 0)]
    exam_id: i64,

    #[arg(long, default_value = "")]
    exam_name: String,

    /// Identifier embedded in clip file names
    #[arg(long, default_value = "0")]
    session_id: String,
}

fn parse_combine(value: &str) -> anyhow::Result<AxisCombine> {
    match value {
        "lateral-and-adc" => Ok(AxisCombine::LateralOrThenAmplitude),
        "any" => Ok(AxisCombine::AnyChannel),
        "all" => Ok(AxisCombine::AllChannels),
        other => bail!("unknown motion combine mode `{other}` (expected lateral-and-adc, any, all)"),
    }
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let upload = match (&cli.endpoint, &cli.token) {
        (Some(endpoint), Some(token)) => Some(UploadOptions {
            endpoint: endpoint.clone(),
            token: token.clone(),
        }),
        (Some(_), None) => bail!("--endpoint requires --token"),
        _ => None,
    };

    let opts = RecorderOptions {
        audio: AudioConfig {
            sample_rate_hz: cli.sample_rate,
            frame_size_samples: cli.frame_size,
            record_seconds: cli.record_seconds,
        },
        device: cli.device,
        sound_threshold: cli.sound_threshold,
        motion_device: cli.motion_device,
        motion_baud: cli.motion_baud,
        motion_percent: cli.motion_percent,
        motion_combine: parse_combine(&cli.motion_combine)?,
        base_dir: cli.base_dir,
        session_id: cli.session_id,
        examination: Examination {
            id: cli.exam_id,
            name: cli.exam_name,
        },
        upload,
    };

    let handle = runtime::start(opts)?;
    let shutdown = ShutdownHandler::new().install();

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                if handle.capture_failed() {
                    tracing::error!("audio capture failed; stopping session");
                    break;
                }
                ticks += 1;
                if ticks % 30 == 0 {
                    use std::sync::atomic::Ordering;
                    tracing::info!(
                        "frames={} triggers={} clips={} uploads_ok={} uploads_failed={}",
                        handle.metrics.frames_processed.load(Ordering::Relaxed),
                        handle.metrics.triggers_armed.load(Ordering::Relaxed),
                        handle.metrics.clips_encoded.load(Ordering::Relaxed),
                        handle.metrics.uploads_ok.load(Ordering::Relaxed),
                        handle.metrics.uploads_failed.load(Ordering::Relaxed),
                    );
                }
            }
        }
    }

    handle.shutdown().await?;
    tracing::info!("session closed");
    Ok(())
}
