//! Voice session orchestration.
//!
//! The controller in this crate is the only component that decides when to
//! listen, when to speak, and when to restart. Recognizer and synthesizer
//! engines stay dumb wrappers; every "what happens next" decision funnels
//! through one select loop so independent restart triggers cannot race.

pub mod config;
pub mod controller;
pub mod events;
pub mod state;
pub mod watchdog;

pub use config::{VoiceModeConfig, VoiceModeUpdate};
pub use controller::{VoiceSessionController, VoiceSessionOptions};
pub use events::SessionEvent;
pub use state::SessionState;
pub use watchdog::SilenceWatchdog;
