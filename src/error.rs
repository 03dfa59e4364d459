//! Error types for the tutor gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tutor gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote completion call failed before producing any content
    #[error("transport error: {0}")]
    Transport(String),

    /// Stream failed after partial content was produced
    #[error("stream error: {0}")]
    Stream(String),

    /// Session not found in the registry
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
