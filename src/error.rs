//! Error types for hark

use thiserror::Error;

/// Result type alias for hark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hark
///
/// Only `Config`, `AudioUnavailable` (after exhausted retries), and
/// `DetectorInit` without a configured fallback are fatal to a session.
/// Everything else is absorbed at the component boundary and surfaced as a
/// spoken or logged message.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No input device, device busy, or permission denied
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),

    /// Audio stream error after a successful open
    #[error("audio error: {0}")]
    Audio(String),

    /// Wake-word detector failed to initialize
    #[error("detector init failed: {0}")]
    DetectorInit(String),

    /// Speech-to-text error
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Speech output error (never fatal to the session)
    #[error("speech output error: {0}")]
    Output(String),

    /// Session lifecycle error
    #[error("session error: {0}")]
    Session(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error terminates the session with a non-zero exit
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AudioUnavailable(_) | Self::DetectorInit(_) | Self::Config(_)
        )
    }
}
