use tokio::sync::broadcast;
use tracing::debug;

use crate::state::SessionState;

/// Events the session emits to its subscribers.
///
/// This is the host-facing observable contract: one `StateChanged` per
/// transition in the controller's table, zero or more `Interim`s and
/// exactly one `Final` per utterance, and a terminal event on every
/// failure path so the UI can never be left stuck in a transient state.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Provisional transcript, forwarded only when configured.
    Interim { utterance_id: u64, text: String },
    /// Stable transcript; the host answers this with `speak(reply)`.
    Final { utterance_id: u64, text: String },
    /// A failure the host should render. `recoverable` tells it whether a
    /// retry affordance makes sense.
    Error { message: String, recoverable: bool },
    /// Voice input is permanently unavailable on this platform. Fired at
    /// most once per controller.
    Disabled { reason: String },
    /// The loudness monitor could not start; the session continues without
    /// a level feed.
    MonitorUnavailable { reason: String },
}

/// Broadcast fan-out for session events.
pub(crate) struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        debug!(?event, "Session event");
        // No receivers is fine; the host may not have subscribed yet.
        let _ = self.tx.send(event);
    }
}
