//! Recognizer engine interface
//!
//! Any speech-to-text backend (platform service, cloud API, test mock)
//! implements this trait. Engines are dumb wrappers: they capture, emit
//! events, and tear down on request. They never restart themselves.

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::EngineEvent;
use voxorb_foundation::Capability;

/// Errors that can occur in recognizer engines
#[derive(Debug, Clone, Error)]
pub enum RecognizerError {
    /// No recognition capability on this platform. Terminal for the feature.
    #[error("Speech recognition not available: {0}")]
    Unsupported(String),

    #[error("Microphone permission denied")]
    PermissionDenied,

    /// The platform gave up waiting for speech.
    #[error("No speech detected")]
    NoSpeech,

    #[error("Network error: {0}")]
    Network(String),

    /// Recognition was torn down mid-utterance.
    #[error("Recognition aborted")]
    Aborted,

    #[error("Engine failure: {0}")]
    Engine(String),
}

impl RecognizerError {
    /// Whether the session may silently retry after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RecognizerError::Unsupported(_) | RecognizerError::PermissionDenied
        )
    }
}

/// Metadata about a recognizer engine
#[derive(Debug, Clone)]
pub struct EngineInfo {
    /// Unique identifier (e.g. "platform", "mock")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// BCP 47 language tag the engine listens in
    pub language: String,
}

/// The trait all recognizer engines implement.
///
/// One activation runs until a final result, an explicit `stop`, or a
/// platform timeout; multi-utterance continuous streaming is deliberately
/// not part of the contract because platform support for it is unreliable.
#[async_trait]
pub trait RecognizerEngine: Send + Sync + Debug {
    /// Engine metadata
    fn info(&self) -> EngineInfo;

    /// One-shot capability probe; consumed once at controller construction.
    fn capability(&self) -> Capability;

    /// Begin a recognition activation, delivering events on `events`.
    ///
    /// The engine owns the sender for the lifetime of the activation and
    /// must drop it when the activation ends, so callers can observe
    /// teardown by channel closure.
    async fn start(&mut self, events: mpsc::Sender<EngineEvent>) -> Result<(), RecognizerError>;

    /// Tear down the current activation. Must be idempotent, and must not
    /// return until the engine has actually released its resources: a
    /// subsequent `start` races a half-dead activation otherwise.
    async fn stop(&mut self) -> Result<(), RecognizerError>;
}
