//! Core types for synthesis

use serde::{Deserialize, Serialize};

/// Voice information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Unique voice identifier
    pub id: String,
    /// Human-readable voice name
    pub name: String,
    /// Language tag (e.g. "en-US", "fr-FR")
    pub language: String,
    /// Relative synthesis quality, used by the selection policy
    pub quality: VoiceQuality,
}

/// Voice quality tiers, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VoiceQuality {
    Low,
    Normal,
    High,
}

/// Options for an individual utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOptions {
    /// Speaking rate multiplier (1.0 is normal)
    pub rate: f32,
    /// Voice pitch (0.0-2.0, 1.0 is normal)
    pub pitch: f32,
    /// Volume (0.0-1.0)
    pub volume: f32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}
