//! Mock synthesizer engine for tests and the demo app

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use crate::engine::{SynthesisCompletion, SynthesizerEngine};
use crate::error::{TtsError, TtsResult};
use crate::types::{SynthesisOptions, VoiceInfo};
use voxorb_foundation::Capability;

#[derive(Debug, Default)]
struct MockSynthState {
    /// In-flight utterance: sequence number + completion sender.
    pending: Option<(u64, oneshot::Sender<TtsResult<()>>)>,
    spoken: Vec<String>,
    last_voice: Option<VoiceInfo>,
    voices: Vec<VoiceInfo>,
    voice_list_delay: Option<Duration>,
    fail_next_speak: Option<TtsError>,
    /// When set, utterances complete on their own after this long.
    auto_complete_after: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockSynthShared {
    state: Mutex<MockSynthState>,
    cancels: AtomicU64,
    seq: AtomicU64,
}

/// Configurable mock synthesizer engine.
///
/// Utterances stay pending until the test resolves them through the handle,
/// the engine cancels them, or an auto-complete delay elapses (demo mode).
#[derive(Debug)]
pub struct MockSynthesizer {
    shared: Arc<MockSynthShared>,
    capability: Capability,
}

/// Test-side handle for observing and resolving a [`MockSynthesizer`].
#[derive(Debug, Clone)]
pub struct MockSynthesizerHandle {
    shared: Arc<MockSynthShared>,
}

impl MockSynthesizer {
    pub fn new() -> (Self, MockSynthesizerHandle) {
        let shared = Arc::new(MockSynthShared::default());
        (
            Self {
                shared: shared.clone(),
                capability: Capability::Supported,
            },
            MockSynthesizerHandle { shared },
        )
    }

    /// An engine whose capability probe reports the platform is missing.
    pub fn unsupported(reason: impl Into<String>) -> (Self, MockSynthesizerHandle) {
        let (mut engine, handle) = Self::new();
        engine.capability = Capability::unsupported(reason);
        (engine, handle)
    }

    /// An engine whose utterances finish by themselves after `duration`.
    pub fn auto_completing(duration: Duration) -> (Self, MockSynthesizerHandle) {
        let (engine, handle) = Self::new();
        engine.shared.state.lock().auto_complete_after = Some(duration);
        (engine, handle)
    }
}

#[async_trait]
impl SynthesizerEngine for MockSynthesizer {
    fn name(&self) -> &str {
        "mock"
    }

    fn capability(&self) -> Capability {
        self.capability.clone()
    }

    async fn voices(&mut self) -> TtsResult<Vec<VoiceInfo>> {
        let delay = self.shared.state.lock().voice_list_delay;
        if let Some(delay) = delay {
            // Simulates a platform that fills the list via a one-time
            // asynchronous "voices changed" notification.
            tokio::time::sleep(delay).await;
        }
        Ok(self.shared.state.lock().voices.clone())
    }

    async fn speak(
        &mut self,
        text: &str,
        voice: Option<&VoiceInfo>,
        _options: &SynthesisOptions,
    ) -> TtsResult<SynthesisCompletion> {
        let (tx, rx) = oneshot::channel();
        let seq = self.shared.seq.fetch_add(1, Ordering::SeqCst) + 1;

        let auto_after = {
            let mut state = self.shared.state.lock();
            if let Some(error) = state.fail_next_speak.take() {
                return Err(error);
            }
            if let Some((old_seq, old_tx)) = state.pending.take() {
                debug!(utterance = old_seq, "Mock: implicit cancel of pending utterance");
                let _ = old_tx.send(Err(TtsError::Cancelled));
            }
            state.spoken.push(text.to_string());
            state.last_voice = voice.cloned();
            state.pending = Some((seq, tx));
            state.auto_complete_after
        };

        if let Some(after) = auto_after {
            let shared = self.shared.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let mut state = shared.state.lock();
                if matches!(state.pending, Some((pending_seq, _)) if pending_seq == seq) {
                    if let Some((_, tx)) = state.pending.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
            });
        }

        Ok(rx)
    }

    async fn cancel(&mut self) {
        let pending = self.shared.state.lock().pending.take();
        if let Some((seq, tx)) = pending {
            self.shared.cancels.fetch_add(1, Ordering::SeqCst);
            debug!(utterance = seq, "Mock: utterance cancelled");
            let _ = tx.send(Err(TtsError::Cancelled));
        }
    }
}

impl MockSynthesizerHandle {
    pub fn set_voices(&self, voices: Vec<VoiceInfo>) {
        self.shared.state.lock().voices = voices;
    }

    /// Make the first `voices()` call take this long (async voice load).
    pub fn delay_voice_list(&self, delay: Duration) {
        self.shared.state.lock().voice_list_delay = Some(delay);
    }

    pub fn fail_next_speak(&self, error: TtsError) {
        self.shared.state.lock().fail_next_speak = Some(error);
    }

    /// Resolve the pending utterance as naturally completed.
    pub fn finish_ok(&self) {
        if let Some((_, tx)) = self.shared.state.lock().pending.take() {
            let _ = tx.send(Ok(()));
        }
    }

    /// Resolve the pending utterance with a platform failure.
    pub fn finish_err(&self, error: TtsError) {
        if let Some((_, tx)) = self.shared.state.lock().pending.take() {
            let _ = tx.send(Err(error));
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.shared.state.lock().spoken.clone()
    }

    pub fn last_voice(&self) -> Option<VoiceInfo> {
        self.shared.state.lock().last_voice.clone()
    }

    pub fn cancels(&self) -> u64 {
        self.shared.cancels.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completion_resolves_when_finished() {
        let (mut engine, handle) = MockSynthesizer::new();
        let completion = engine
            .speak("hello", None, &SynthesisOptions::default())
            .await
            .unwrap();
        assert!(handle.is_speaking());
        handle.finish_ok();
        assert!(completion.await.unwrap().is_ok());
        assert!(!handle.is_speaking());
    }

    #[tokio::test]
    async fn cancel_settles_pending_completion() {
        let (mut engine, handle) = MockSynthesizer::new();
        let completion = engine
            .speak("hello", None, &SynthesisOptions::default())
            .await
            .unwrap();
        engine.cancel().await;
        assert!(matches!(
            completion.await.unwrap(),
            Err(TtsError::Cancelled)
        ));
        assert_eq!(handle.cancels(), 1);
    }

    #[tokio::test]
    async fn cancel_with_nothing_pending_is_a_no_op() {
        let (mut engine, handle) = MockSynthesizer::new();
        engine.cancel().await;
        assert_eq!(handle.cancels(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_completing_utterance_finishes_on_its_own() {
        let (mut engine, _handle) = MockSynthesizer::auto_completing(Duration::from_millis(200));
        let completion = engine
            .speak("hello", None, &SynthesisOptions::default())
            .await
            .unwrap();
        assert!(completion.await.unwrap().is_ok());
    }
}
