use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("input device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("stream error: {0}")]
    Stream(#[from] cpal::StreamError),

    #[error("build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("default stream config error: {0}")]
    DefaultStreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("device enumeration error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("device name error: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("fatal error, cannot recover: {0}")]
    Fatal(String),
}
