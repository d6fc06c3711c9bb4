use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{RecognizerEngine, RecognizerError};
use crate::next_utterance_id;
use crate::types::{EngineEvent, RecognizerEvent};
use voxorb_foundation::Capability;

/// Wrapper around a recognizer engine.
///
/// Stamps utterance ids, deduplicates final results (some platforms fire the
/// final result twice per activation), and guarantees that `stop` has fully
/// torn down the previous activation before `start` can create a new one.
pub struct SpeechRecognizer {
    engine: Box<dyn RecognizerEngine>,
    capability: Capability,
    active: bool,
    forward_handle: Option<JoinHandle<()>>,
}

impl SpeechRecognizer {
    /// Wrap an engine, probing capability exactly once.
    pub fn new(engine: Box<dyn RecognizerEngine>) -> Self {
        let capability = engine.capability();
        let info = engine.info();
        debug!(
            engine = %info.id,
            language = %info.language,
            supported = capability.is_supported(),
            "Recognizer engine wrapped"
        );
        Self {
            engine,
            capability,
            active: false,
            forward_handle: None,
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start a recognition activation, delivering stamped events on `out`.
    /// A no-op when already active: no duplicate engine acquisition.
    pub async fn start(
        &mut self,
        out: mpsc::Sender<RecognizerEvent>,
    ) -> Result<(), RecognizerError> {
        if self.active {
            debug!("Recognizer already active; ignoring start");
            return Ok(());
        }
        if let Capability::Unsupported { reason } = &self.capability {
            return Err(RecognizerError::Unsupported(reason.clone()));
        }

        let (engine_tx, engine_rx) = mpsc::channel(32);
        self.engine.start(engine_tx).await?;

        let utterance_id = next_utterance_id();
        self.forward_handle = Some(tokio::spawn(forward_events(engine_rx, out, utterance_id)));
        self.active = true;
        debug!(utterance_id, "Recognizer activation started");
        Ok(())
    }

    /// Stop the current activation. Resolves only once the engine has torn
    /// down and the event forwarder has drained, so callers can restart
    /// immediately after awaiting this. Idempotent.
    pub async fn stop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = self.engine.stop().await {
            warn!("Recognizer stop reported error: {}", e);
        }
        // The engine dropped its sender; the forwarder drains what is left
        // and exits. Awaiting it is what makes restart-after-stop safe.
        if let Some(handle) = self.forward_handle.take() {
            let _ = handle.await;
        }
        self.active = false;
        debug!("Recognizer activation stopped");
    }
}

/// Per-activation event pump: stamps ids, drops duplicate finals, forwards.
async fn forward_events(
    mut engine_rx: mpsc::Receiver<EngineEvent>,
    out: mpsc::Sender<RecognizerEvent>,
    utterance_id: u64,
) {
    let mut final_delivered = false;

    while let Some(event) = engine_rx.recv().await {
        let forwarded = match event {
            EngineEvent::Started => Some(RecognizerEvent::Started),
            EngineEvent::Interim { text } => {
                if final_delivered {
                    debug!(utterance_id, "Dropping interim after final");
                    None
                } else {
                    Some(RecognizerEvent::Interim { utterance_id, text })
                }
            }
            EngineEvent::Final { text } => {
                if final_delivered {
                    debug!(utterance_id, "Dropping duplicate final result");
                    None
                } else {
                    final_delivered = true;
                    Some(RecognizerEvent::Final { utterance_id, text })
                }
            }
            EngineEvent::Error { error } => Some(RecognizerEvent::Error { error }),
            EngineEvent::Ended => Some(RecognizerEvent::Ended),
        };

        if let Some(event) = forwarded {
            if out.send(event).await.is_err() {
                debug!("Recognizer event receiver dropped; forwarder exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRecognizer;

    #[tokio::test]
    async fn final_result_is_delivered_once() {
        let (engine, handle) = MockRecognizer::new();
        let mut recognizer = SpeechRecognizer::new(Box::new(engine));
        let (tx, mut rx) = mpsc::channel(16);

        recognizer.start(tx).await.unwrap();
        assert!(matches!(rx.recv().await, Some(RecognizerEvent::Started)));

        handle.emit_final("hello there").await;
        handle.emit_final("hello there").await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, RecognizerEvent::Final { ref text, .. } if text == "hello there"));

        // The duplicate is swallowed; stopping closes the stream with no
        // second final in between.
        recognizer.stop().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn interim_after_final_is_dropped() {
        let (engine, handle) = MockRecognizer::new();
        let mut recognizer = SpeechRecognizer::new(Box::new(engine));
        let (tx, mut rx) = mpsc::channel(16);

        recognizer.start(tx).await.unwrap();
        let _ = rx.recv().await; // Started

        handle.emit_final("done").await;
        handle.emit_interim("stray").await;
        handle.emit_ended().await;

        assert!(matches!(rx.recv().await, Some(RecognizerEvent::Final { .. })));
        assert!(matches!(rx.recv().await, Some(RecognizerEvent::Ended)));
        recognizer.stop().await;
    }

    #[tokio::test]
    async fn dedup_resets_on_next_activation() {
        let (engine, handle) = MockRecognizer::new();
        let mut recognizer = SpeechRecognizer::new(Box::new(engine));

        let (tx, mut rx) = mpsc::channel(16);
        recognizer.start(tx).await.unwrap();
        let _ = rx.recv().await;
        handle.emit_final("first").await;
        let first = rx.recv().await.unwrap();
        let first_id = match first {
            RecognizerEvent::Final { utterance_id, .. } => utterance_id,
            other => panic!("expected final, got {:?}", other),
        };
        recognizer.stop().await;

        let (tx, mut rx) = mpsc::channel(16);
        recognizer.start(tx).await.unwrap();
        let _ = rx.recv().await;
        handle.emit_final("second").await;
        match rx.recv().await.unwrap() {
            RecognizerEvent::Final { utterance_id, text } => {
                assert_eq!(text, "second");
                assert_ne!(utterance_id, first_id);
            }
            other => panic!("expected final, got {:?}", other),
        }
        recognizer.stop().await;
    }

    #[tokio::test]
    async fn start_when_active_is_a_no_op() {
        let (engine, handle) = MockRecognizer::new();
        let mut recognizer = SpeechRecognizer::new(Box::new(engine));
        let (tx, _rx) = mpsc::channel(16);

        recognizer.start(tx.clone()).await.unwrap();
        recognizer.start(tx).await.unwrap();
        assert_eq!(handle.starts(), 1);
        recognizer.stop().await;
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_no_op() {
        let (engine, handle) = MockRecognizer::new();
        let mut recognizer = SpeechRecognizer::new(Box::new(engine));
        recognizer.stop().await;
        assert_eq!(handle.stops(), 0);
    }

    #[tokio::test]
    async fn unsupported_engine_refuses_to_start() {
        let (engine, handle) = MockRecognizer::unsupported("no speech service");
        let mut recognizer = SpeechRecognizer::new(Box::new(engine));
        let (tx, _rx) = mpsc::channel(16);

        let err = recognizer.start(tx).await.unwrap_err();
        assert!(matches!(err, RecognizerError::Unsupported(_)));
        assert!(!err.is_recoverable());
        // The engine itself is never touched.
        assert_eq!(handle.starts(), 0);
    }
}
