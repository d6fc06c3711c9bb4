//! Error types for synthesis

use thiserror::Error;

/// TTS error types
#[derive(Error, Debug)]
pub enum TtsError {
    /// Engine is not available on this platform
    #[error("TTS engine not available: {0}")]
    EngineNotAvailable(String),

    /// Voice not found or not supported
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    /// Synthesis failed mid-utterance
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// The utterance was cancelled before natural completion
    #[error("Synthesis cancelled")]
    Cancelled,

    /// Invalid text input
    #[error("Invalid text input: {0}")]
    InvalidInput(String),
}

/// Result type for TTS operations
pub type TtsResult<T> = Result<T, TtsError>;
