//! Mock recognizer engine for tests and the demo app

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{EngineInfo, RecognizerEngine, RecognizerError};
use crate::types::EngineEvent;
use voxorb_foundation::Capability;

#[derive(Debug)]
struct MockShared {
    /// Event sender for the current activation; `None` when inactive.
    slot: Mutex<Option<mpsc::Sender<EngineEvent>>>,
    starts: AtomicU64,
    stops: AtomicU64,
    /// Lines the scripted variant speaks, one per activation.
    script: Mutex<VecDeque<String>>,
    script_delay: Duration,
}

/// Configurable mock recognizer engine.
///
/// Two modes: handle-driven (tests push events through a
/// [`MockRecognizerHandle`]) and scripted (each activation emits an interim
/// then a final from a canned line, which powers the demo binary).
#[derive(Debug)]
pub struct MockRecognizer {
    shared: Arc<MockShared>,
    capability: Capability,
    fail_next_start: Mutex<Option<RecognizerError>>,
}

/// Test-side handle for driving a [`MockRecognizer`].
#[derive(Debug, Clone)]
pub struct MockRecognizerHandle {
    shared: Arc<MockShared>,
}

impl MockRecognizer {
    pub fn new() -> (Self, MockRecognizerHandle) {
        Self::build(
            Capability::Supported,
            VecDeque::new(),
            Duration::from_millis(400),
        )
    }

    /// An engine whose capability probe reports the platform is missing.
    pub fn unsupported(reason: impl Into<String>) -> (Self, MockRecognizerHandle) {
        let (mut engine, handle) = Self::new();
        engine.capability = Capability::unsupported(reason);
        (engine, handle)
    }

    /// An engine that emits one interim + final per activation from `lines`.
    pub fn scripted(
        lines: impl IntoIterator<Item = impl Into<String>>,
        delay: Duration,
    ) -> (Self, MockRecognizerHandle) {
        let script: VecDeque<String> = lines.into_iter().map(Into::into).collect();
        Self::build(Capability::Supported, script, delay)
    }

    fn build(
        capability: Capability,
        script: VecDeque<String>,
        script_delay: Duration,
    ) -> (Self, MockRecognizerHandle) {
        let shared = Arc::new(MockShared {
            slot: Mutex::new(None),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            script: Mutex::new(script),
            script_delay,
        });
        (
            Self {
                shared: shared.clone(),
                capability,
                fail_next_start: Mutex::new(None),
            },
            MockRecognizerHandle { shared },
        )
    }

    /// Make the next `start` call fail with `error`.
    pub fn fail_next_start(&self, error: RecognizerError) {
        *self.fail_next_start.lock() = Some(error);
    }
}

#[async_trait]
impl RecognizerEngine for MockRecognizer {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            id: "mock".to_string(),
            name: "Mock recognizer".to_string(),
            language: "en-US".to_string(),
        }
    }

    fn capability(&self) -> Capability {
        self.capability.clone()
    }

    async fn start(&mut self, events: mpsc::Sender<EngineEvent>) -> Result<(), RecognizerError> {
        if let Some(error) = self.fail_next_start.lock().take() {
            return Err(error);
        }

        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        let _ = events.send(EngineEvent::Started).await;
        *self.shared.slot.lock() = Some(events);

        // Scripted mode: play the next canned line through the slot so a
        // stop mid-line just goes quiet instead of erroring.
        let line = self.shared.script.lock().pop_front();
        if let Some(line) = line {
            let shared = self.shared.clone();
            tokio::spawn(async move {
                tokio::time::sleep(shared.script_delay).await;
                let halfway = line.split_whitespace().count() / 2;
                let interim: String = line
                    .split_whitespace()
                    .take(halfway.max(1))
                    .collect::<Vec<_>>()
                    .join(" ");
                send_via_slot(&shared, EngineEvent::Interim { text: interim }).await;

                tokio::time::sleep(shared.script_delay).await;
                send_via_slot(&shared, EngineEvent::Final { text: line }).await;
                send_via_slot(&shared, EngineEvent::Ended).await;
            });
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RecognizerError> {
        let had_activation = self.shared.slot.lock().take().is_some();
        if had_activation {
            self.shared.stops.fetch_add(1, Ordering::SeqCst);
            debug!("Mock recognizer activation torn down");
        }
        Ok(())
    }
}

async fn send_via_slot(shared: &MockShared, event: EngineEvent) {
    let sender = shared.slot.lock().clone();
    if let Some(sender) = sender {
        let _ = sender.send(event).await;
    }
}

impl MockRecognizerHandle {
    pub async fn emit_interim(&self, text: impl Into<String>) {
        send_via_slot(&self.shared, EngineEvent::Interim { text: text.into() }).await;
    }

    pub async fn emit_final(&self, text: impl Into<String>) {
        send_via_slot(&self.shared, EngineEvent::Final { text: text.into() }).await;
    }

    pub async fn emit_error(&self, error: RecognizerError) {
        send_via_slot(&self.shared, EngineEvent::Error { error }).await;
    }

    pub async fn emit_ended(&self) {
        send_via_slot(&self.shared, EngineEvent::Ended).await;
    }

    /// Number of activations the engine has seen.
    pub fn starts(&self) -> u64 {
        self.shared.starts.load(Ordering::SeqCst)
    }

    /// Number of teardowns the engine has performed.
    pub fn stops(&self) -> u64 {
        self.shared.stops.load(Ordering::SeqCst)
    }

    /// Whether an activation is currently live.
    pub fn is_active(&self) -> bool {
        self.shared.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_emits_started_and_registers_activation() {
        let (mut engine, handle) = MockRecognizer::new();
        let (tx, mut rx) = mpsc::channel(8);

        engine.start(tx).await.unwrap();
        assert!(matches!(rx.recv().await, Some(EngineEvent::Started)));
        assert!(handle.is_active());
        assert_eq!(handle.starts(), 1);
    }

    #[tokio::test]
    async fn stop_closes_the_event_channel() {
        let (mut engine, handle) = MockRecognizer::new();
        let (tx, mut rx) = mpsc::channel(8);

        engine.start(tx).await.unwrap();
        let _ = rx.recv().await;
        engine.stop().await.unwrap();

        assert!(!handle.is_active());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn emits_after_stop_are_silently_dropped() {
        let (mut engine, handle) = MockRecognizer::new();
        let (tx, mut rx) = mpsc::channel(8);

        engine.start(tx).await.unwrap();
        let _ = rx.recv().await;
        engine.stop().await.unwrap();
        handle.emit_final("too late").await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn failed_start_consumes_the_scripted_failure() {
        let (mut engine, handle) = MockRecognizer::new();
        engine.fail_next_start(RecognizerError::Network("offline".into()));

        let (tx, _rx) = mpsc::channel(8);
        let err = engine.start(tx).await.unwrap_err();
        assert!(matches!(err, RecognizerError::Network(_)));
        assert_eq!(handle.starts(), 0);

        let (tx, mut rx) = mpsc::channel(8);
        engine.start(tx).await.unwrap();
        assert!(matches!(rx.recv().await, Some(EngineEvent::Started)));
    }
}
