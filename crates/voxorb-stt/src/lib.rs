//! Speech recognition abstraction layer.
//!
//! This crate provides the recognizer engine trait, the transcript event
//! types, and the `SpeechRecognizer` wrapper that stamps utterance ids and
//! guards against platform double-fire. Restart policy lives with the
//! session controller, not here.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod engine;
pub mod mock;
pub mod recognizer;
pub mod types;

pub use engine::{EngineInfo, RecognizerEngine, RecognizerError};
pub use recognizer::SpeechRecognizer;
pub use types::{EngineEvent, RecognizerEvent};

/// Generates unique utterance IDs
static UTTERANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique utterance ID
pub fn next_utterance_id() -> u64 {
    UTTERANCE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
