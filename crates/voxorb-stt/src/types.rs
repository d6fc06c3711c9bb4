//! Event types for speech recognition

use crate::engine::RecognizerError;

/// Raw events emitted by a recognizer engine for one activation.
///
/// Engines emit these without utterance ids; the `SpeechRecognizer` wrapper
/// stamps ids and deduplicates before anything downstream sees them.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine has actually begun capturing speech.
    Started,
    /// Provisional transcript, may be revised.
    Interim { text: String },
    /// Complete, stable transcript for the utterance.
    Final { text: String },
    /// Engine failure, already classified.
    Error { error: RecognizerError },
    /// The engine stopped, for whatever reason. Purely informational;
    /// restart decisions belong to the caller.
    Ended,
}

/// Recognition events as delivered to the session controller.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    Started,
    /// Provisional transcript (ongoing speech)
    Interim { utterance_id: u64, text: String },
    /// Final transcript (utterance complete)
    Final { utterance_id: u64, text: String },
    Error { error: RecognizerError },
    Ended,
}
