use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("No usable audio input device")]
    DeviceUnavailable,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Chunk queue full, dropped {count} frames")]
    Overflow { count: u64 },

    #[error("Devices error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Stream config error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal audio error: {0}")]
    Fatal(String),
}
