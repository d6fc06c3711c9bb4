//! Text-to-speech abstraction layer.
//!
//! Provides the synthesizer engine trait and the `SpeechSynthesizer` wrapper
//! that implements last-call-wins cancellation and the voice selection
//! policy. Engines report completion over a oneshot channel so callers can
//! keep servicing events (and cancel) while an utterance is in flight.

pub mod engine;
pub mod error;
pub mod mock;
pub mod synthesizer;
pub mod types;

pub use engine::{SynthesisCompletion, SynthesizerEngine};
pub use error::{TtsError, TtsResult};
pub use synthesizer::{SpeechSynthesizer, SynthesizerConfig};
pub use types::{SynthesisOptions, VoiceInfo, VoiceQuality};
