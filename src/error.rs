use thiserror::Error;

/// Errors surfaced by the noise filter and its capture plumbing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Event source unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for filter operations
pub type Result<T> = std::result::Result<T, Error>;
