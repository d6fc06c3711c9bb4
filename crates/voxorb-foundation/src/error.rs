use thiserror::Error;

/// Top-level error for the voice session layer.
///
/// Engine wrappers translate platform errors into this taxonomy before they
/// reach the session controller; the controller branches only on these
/// variants, never on raw engine error objects.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("{feature} unsupported on this platform: {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Recognition error: {message}")]
    Recognition { message: String, recoverable: bool },

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

impl VoiceError {
    /// Whether the session may retry automatically after this error.
    ///
    /// Unsupported platform and denied permissions are terminal for the
    /// affected feature; retrying them drains battery for nothing.
    pub fn is_recoverable(&self) -> bool {
        match self {
            VoiceError::Unsupported { .. } => false,
            VoiceError::Audio(AudioError::PermissionDenied) => false,
            VoiceError::Recognition { recoverable, .. } => *recoverable,
            VoiceError::Synthesis(_) => true,
            VoiceError::SessionClosed => false,
            VoiceError::InvalidTransition { .. } => false,
            VoiceError::Fatal(_) => false,
            VoiceError::Audio(_) => true,
        }
    }
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Input device unavailable: {name:?}")]
    DeviceUnavailable { name: Option<String> },

    #[error("Device disconnected")]
    DeviceDisconnected,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Ring buffer overrun, dropped {count} samples")]
    BufferOverrun { count: usize },

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Default stream config error: {0}")]
    DefaultStreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}
