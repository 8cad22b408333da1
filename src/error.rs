//! Error types for the voice helper

use thiserror::Error;

/// Result type alias for voice helper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice helper
///
/// Recognition failures and generation failures are not represented here:
/// capture reports them as [`crate::session::Heard`] states and the
/// generation client substitutes an apology. Only startup and the
/// collaborators' own plumbing produce these.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Generation backend call failed
    #[error("generation error: {0}")]
    Generation(String),

    /// Generation backend unreachable at startup
    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Memory file could not be written
    #[error("memory error: {0}")]
    Memory(String),

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
