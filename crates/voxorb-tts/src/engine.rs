//! Synthesizer engine abstraction

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::oneshot;

use crate::error::TtsResult;
use crate::types::{SynthesisOptions, VoiceInfo};
use voxorb_foundation::Capability;

/// Resolves when the utterance finishes.
///
/// `Ok(())` on natural completion, `Err(TtsError::Cancelled)` when the
/// utterance was cut off, other errors on platform failure. A dropped
/// sender reads the same as a cancellation.
pub type SynthesisCompletion = oneshot::Receiver<TtsResult<()>>;

/// Core synthesizer engine interface.
///
/// Implementations wrap a platform speech service. At most one utterance is
/// live per engine; starting a new one while another is speaking is the
/// wrapper's bug, not the engine's concern.
#[async_trait]
pub trait SynthesizerEngine: Send + Sync + Debug {
    /// Engine name/identifier
    fn name(&self) -> &str;

    /// One-shot capability probe; consumed once at construction.
    fn capability(&self) -> Capability;

    /// The platform voice list.
    ///
    /// Platforms that populate the list asynchronously must wait for the
    /// one-time load internally, bounded by their own timeout; callers
    /// additionally bound the whole call, so this must never block forever.
    async fn voices(&mut self) -> TtsResult<Vec<VoiceInfo>>;

    /// Start speaking `text`, returning a completion channel immediately.
    /// `voice: None` means the platform default.
    async fn speak(
        &mut self,
        text: &str,
        voice: Option<&VoiceInfo>,
        options: &SynthesisOptions,
    ) -> TtsResult<SynthesisCompletion>;

    /// Cancel the in-flight utterance, if any. The pending completion must
    /// settle with `Err(TtsError::Cancelled)`; it must not hang. Idempotent.
    async fn cancel(&mut self);
}
