use thiserror::Error;

use super::quality::Quality;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Please paste a valid http(s) video URL")]
    InvalidInput,

    #[error("Invalid request ID.")]
    InvalidRequest,

    #[error("{0} is only available on a paid plan")]
    GatedQuality(Quality),

    #[error("Malformed stream event: {0}")]
    MalformedEvent(String),

    #[error("Connection lost. Please try again.")]
    Transport(String),

    #[error("Download URL not available.")]
    ResourceUnavailable,

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
