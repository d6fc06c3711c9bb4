use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// How often the watchdog task checks its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Resettable quiet-period timer.
///
/// While armed, expiry fires exactly one event on the channel and disarms.
/// `reset` replaces any pending deadline; `cancel` disarms without firing.
/// This is the mechanism that ends an utterance when the recognizer's own
/// end-of-speech detection is unreliable or absent, so it must be cancelled
/// whenever recognition is not active.
pub struct SilenceWatchdog {
    timeout: Arc<RwLock<Duration>>,
    deadline: Arc<RwLock<Option<Instant>>>,
    handle: JoinHandle<()>,
}

impl SilenceWatchdog {
    /// Spawn the watchdog task, initially disarmed. Expiries are delivered
    /// on `expiry_tx`; the task exits when the receiver is dropped.
    pub fn spawn(timeout: Duration, expiry_tx: mpsc::Sender<()>) -> Self {
        let timeout = Arc::new(RwLock::new(timeout));
        let deadline: Arc<RwLock<Option<Instant>>> = Arc::new(RwLock::new(None));

        let task_deadline = deadline.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                if expiry_tx.is_closed() {
                    break;
                }

                let expired = {
                    let guard = task_deadline.read();
                    matches!(*guard, Some(d) if Instant::now() >= d)
                };
                if expired {
                    // Disarm before delivering so a slow receiver cannot
                    // observe a second fire for the same quiet period.
                    *task_deadline.write() = None;
                    debug!("Silence watchdog expired");
                    if expiry_tx.send(()).await.is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            timeout,
            deadline,
            handle,
        }
    }

    /// Arm, or re-arm, the timer for a full quiet period from now.
    pub fn reset(&self) {
        let timeout = *self.timeout.read();
        *self.deadline.write() = Some(Instant::now() + timeout);
    }

    /// Disarm without firing.
    pub fn cancel(&self) {
        *self.deadline.write() = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.read().is_some()
    }

    /// Change the quiet period; takes effect at the next `reset`.
    pub fn set_timeout(&self, timeout: Duration) {
        *self.timeout.write() = timeout;
    }
}

impl Drop for SilenceWatchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_the_quiet_period() {
        let (tx, mut rx) = mpsc::channel(4);
        let watchdog = SilenceWatchdog::spawn(TIMEOUT, tx);
        watchdog.reset();

        advance(TIMEOUT + Duration::from_millis(100)).await;
        assert!(rx.recv().await.is_some());

        // Disarmed after firing: no second event without another reset.
        advance(TIMEOUT * 2).await;
        assert!(rx.try_recv().is_err());
        assert!(!watchdog.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_replaces_the_pending_deadline() {
        let (tx, mut rx) = mpsc::channel(4);
        let watchdog = SilenceWatchdog::spawn(TIMEOUT, tx);
        watchdog.reset();

        advance(Duration::from_secs(2)).await;
        watchdog.reset();
        advance(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());

        advance(Duration::from_millis(1100)).await;
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_expiry() {
        let (tx, mut rx) = mpsc::channel(4);
        let watchdog = SilenceWatchdog::spawn(TIMEOUT, tx);
        watchdog.reset();
        watchdog.cancel();

        advance(TIMEOUT * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn never_fires_while_disarmed() {
        let (tx, mut rx) = mpsc::channel(4);
        let _watchdog = SilenceWatchdog::spawn(TIMEOUT, tx);

        advance(TIMEOUT * 3).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn new_timeout_applies_on_next_reset() {
        let (tx, mut rx) = mpsc::channel(4);
        let watchdog = SilenceWatchdog::spawn(TIMEOUT, tx);
        watchdog.set_timeout(Duration::from_secs(1));
        watchdog.reset();

        advance(Duration::from_millis(1100)).await;
        assert!(rx.recv().await.is_some());
    }
}
