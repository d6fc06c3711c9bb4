use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{VoiceModeConfig, VoiceModeUpdate};
use crate::events::{SessionEvent, SessionEvents};
use crate::state::{SessionState, SessionStateMachine};
use crate::watchdog::SilenceWatchdog;
use voxorb_audio::{LevelMonitor, LevelMonitorConfig};
use voxorb_foundation::{AudioError, Capability, VoiceError};
use voxorb_stt::{RecognizerEngine, RecognizerError, RecognizerEvent, SpeechRecognizer};
use voxorb_telemetry::SessionMetrics;
use voxorb_tts::{
    SpeechSynthesizer, SynthesisCompletion, SynthesizerConfig, SynthesizerEngine, TtsError,
};

/// Options for spawning a session controller.
pub struct VoiceSessionOptions {
    pub config: VoiceModeConfig,
    /// Loudness monitor configuration; `None` runs without a level feed
    /// (recognition does not depend on it).
    pub monitor: Option<LevelMonitorConfig>,
    pub metrics: SessionMetrics,
}

impl Default for VoiceSessionOptions {
    fn default() -> Self {
        Self {
            config: VoiceModeConfig::default(),
            monitor: None,
            metrics: SessionMetrics::new(),
        }
    }
}

enum Command {
    Start {
        done: oneshot::Sender<Result<(), VoiceError>>,
    },
    Stop {
        done: oneshot::Sender<()>,
    },
    Speak {
        text: String,
        done: oneshot::Sender<Result<(), VoiceError>>,
    },
    SetOverlayOpen(bool),
    UpdateConfig(VoiceModeUpdate),
    Shutdown,
}

struct PendingSpeech {
    completion: SynthesisCompletion,
    done: oneshot::Sender<Result<(), VoiceError>>,
}

/// Handle to the voice session controller.
///
/// The controller task is the exclusive owner of the recognizer, the
/// synthesizer, and the microphone monitor; every decision about what
/// happens next runs through its single event loop, in arrival order.
/// The handle only sends commands and observes.
pub struct VoiceSessionController {
    command_tx: mpsc::Sender<Command>,
    events: Arc<SessionEvents>,
    state_rx: watch::Receiver<SessionState>,
    level_rx: watch::Receiver<f32>,
    session_active: Arc<AtomicBool>,
    config: Arc<RwLock<VoiceModeConfig>>,
    metrics: SessionMetrics,
    task: JoinHandle<()>,
}

impl VoiceSessionController {
    /// Spawn the controller task. Must be called within a tokio runtime.
    pub fn spawn(
        recognizer: Box<dyn RecognizerEngine>,
        synthesizer: Box<dyn SynthesizerEngine>,
        options: VoiceSessionOptions,
    ) -> Self {
        let VoiceSessionOptions {
            config,
            monitor,
            metrics,
        } = options;

        let events = Arc::new(SessionEvents::new(64));
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (recognizer_tx, recognizer_rx) = mpsc::channel(64);
        let (watchdog_tx, watchdog_rx) = mpsc::channel(4);

        let watchdog = SilenceWatchdog::spawn(config.silence_timeout, watchdog_tx);
        let synth_config = SynthesizerConfig {
            language: config.language.clone(),
            preferred_voice: config.preferred_voice.clone(),
            ..Default::default()
        };

        let config = Arc::new(RwLock::new(config));
        let session_active = Arc::new(AtomicBool::new(false));

        let task_state = SessionTask {
            recognizer: SpeechRecognizer::new(recognizer),
            synthesizer: SpeechSynthesizer::new(synthesizer, synth_config),
            monitor_config: monitor,
            monitor: None,
            config: config.clone(),
            machine: SessionStateMachine::new(),
            state_tx,
            level_tx: Arc::new(level_tx),
            events: events.clone(),
            metrics: metrics.clone(),
            session_active: session_active.clone(),
            overlay_open: false,
            auto_retries: 0,
            retry_at: None,
            disabled: None,
            watchdog,
            recognizer_tx,
            pending_speech: None,
        };

        let task = tokio::spawn(task_state.run(command_rx, recognizer_rx, watchdog_rx));

        Self {
            command_tx,
            events,
            state_rx,
            level_rx,
            session_active,
            config,
            metrics,
            task,
        }
    }

    /// Begin a listening session. Resolves once recognition is live (or
    /// with the classified error that prevented it). A no-op when the
    /// session is already listening.
    pub async fn start(&self) -> Result<(), VoiceError> {
        let (done, rx) = oneshot::channel();
        self.send(Command::Start { done }).await?;
        rx.await.map_err(|_| VoiceError::SessionClosed)?
    }

    /// Close the session: stop recognition, synthesis, and audio capture.
    /// Any in-flight `speak` settles with `Err(SessionClosed)`.
    pub async fn stop(&self) {
        let (done, rx) = oneshot::channel();
        if self.send(Command::Stop { done }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Speak `text`, pausing recognition for the full duration. Resolves
    /// `Ok` on natural completion; `Err` on synthesis failure, supersession
    /// by a newer utterance, or session close. Never hangs.
    pub async fn speak(&self, text: impl Into<String>) -> Result<(), VoiceError> {
        let (done, rx) = oneshot::channel();
        self.send(Command::Speak {
            text: text.into(),
            done,
        })
        .await?;
        rx.await.map_err(|_| VoiceError::SessionClosed)?
    }

    /// Host-side restart gate: while a blocking overlay is open, the
    /// controller defers every auto-restart.
    pub async fn set_overlay_open(&self, open: bool) {
        let _ = self.send(Command::SetOverlayOpen(open)).await;
    }

    /// Merge a partial configuration update, last write wins per field.
    pub async fn update_config(&self, update: VoiceModeUpdate) {
        let _ = self.send(Command::UpdateConfig(update)).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Latest microphone level in [0, 1]; stays 0 when the monitor is
    /// disabled or unavailable.
    pub fn level_watch(&self) -> watch::Receiver<f32> {
        self.level_rx.clone()
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> VoiceModeConfig {
        self.config.read().clone()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics.clone()
    }

    /// Stop everything and wait for the controller task to exit.
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
        let _ = self.task.await;
    }

    async fn send(&self, command: Command) -> Result<(), VoiceError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| VoiceError::SessionClosed)
    }
}

struct SessionTask {
    recognizer: SpeechRecognizer,
    synthesizer: SpeechSynthesizer,
    monitor_config: Option<LevelMonitorConfig>,
    monitor: Option<LevelMonitor>,
    config: Arc<RwLock<VoiceModeConfig>>,
    machine: SessionStateMachine,
    state_tx: watch::Sender<SessionState>,
    level_tx: Arc<watch::Sender<f32>>,
    events: Arc<SessionEvents>,
    metrics: SessionMetrics,
    /// Gates every auto-restart; an explicit user/host stop clears it
    /// before teardown begins, so late events cannot resurrect the session.
    session_active: Arc<AtomicBool>,
    overlay_open: bool,
    auto_retries: u32,
    retry_at: Option<Instant>,
    /// Set once when the recognizer reports the platform unsupported; a
    /// disabled controller never touches the engine again.
    disabled: Option<String>,
    watchdog: SilenceWatchdog,
    recognizer_tx: mpsc::Sender<RecognizerEvent>,
    pending_speech: Option<PendingSpeech>,
}

impl SessionTask {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut recognizer_rx: mpsc::Receiver<RecognizerEvent>,
        mut watchdog_rx: mpsc::Receiver<()>,
    ) {
        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
                Some(event) = recognizer_rx.recv() => {
                    self.handle_recognizer_event(event).await;
                }
                Some(()) = watchdog_rx.recv() => {
                    self.handle_silence_timeout().await;
                }
                result = async { (&mut self.pending_speech.as_mut().unwrap().completion).await },
                    if self.pending_speech.is_some() =>
                {
                    let pending = self.pending_speech.take().unwrap();
                    let result = match result {
                        Ok(inner) => inner,
                        // Engine dropped the sender mid-utterance.
                        Err(_) => Err(TtsError::Cancelled),
                    };
                    self.handle_speech_result(pending.done, result).await;
                }
                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(far_future)),
                    if retry_at.is_some() =>
                {
                    self.handle_error_retry().await;
                }
            }
        }
        self.teardown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { done } => self.cmd_start(done).await,
            Command::Stop { done } => {
                self.close_session().await;
                let _ = done.send(());
            }
            Command::Speak { text, done } => self.cmd_speak(text, done).await,
            Command::SetOverlayOpen(open) => {
                debug!(open, "Overlay gate updated");
                self.overlay_open = open;
            }
            Command::UpdateConfig(update) => self.apply_config_update(update),
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    async fn cmd_start(&mut self, done: oneshot::Sender<Result<(), VoiceError>>) {
        if let Some(reason) = &self.disabled {
            // Disabled is terminal; the event already fired exactly once.
            let _ = done.send(Err(VoiceError::Unsupported {
                feature: "speech recognition".to_string(),
                reason: reason.clone(),
            }));
            return;
        }

        if self.session_active() && self.machine.current() == SessionState::Listening {
            debug!("Session already listening; start is a no-op");
            let _ = done.send(Ok(()));
            return;
        }

        if let Capability::Unsupported { reason } = self.recognizer.capability().clone() {
            self.disabled = Some(reason.clone());
            self.events.emit(SessionEvent::Disabled {
                reason: reason.clone(),
            });
            let _ = done.send(Err(VoiceError::Unsupported {
                feature: "speech recognition".to_string(),
                reason,
            }));
            return;
        }

        self.set_session_active(true);
        self.metrics.sessions_started.fetch_add(1, Ordering::Relaxed);
        self.auto_retries = 0;
        self.retry_at = None;
        self.ensure_monitor().await;

        let _ = done.send(self.begin_listening().await);
    }

    async fn cmd_speak(&mut self, text: String, done: oneshot::Sender<Result<(), VoiceError>>) {
        if let Capability::Unsupported { reason } = self.synthesizer.capability().clone() {
            let _ = done.send(Err(VoiceError::Unsupported {
                feature: "speech synthesis".to_string(),
                reason,
            }));
            return;
        }

        match self.machine.current() {
            SessionState::Idle | SessionState::Error => {
                let _ = done.send(Err(VoiceError::InvalidTransition {
                    from: self.machine.current().to_string(),
                    to: SessionState::Speaking.to_string(),
                }));
                return;
            }
            _ => {}
        }

        // Echo prevention: the microphone must never hear the assistant.
        // Recognition is torn down, and awaited, before synthesis starts.
        self.watchdog.cancel();
        self.recognizer.stop().await;
        if self.machine.current() == SessionState::Listening {
            self.transition(SessionState::Processing);
        }

        // Last call wins: settle the superseded utterance's caller.
        if let Some(previous) = self.pending_speech.take() {
            let _ = previous
                .done
                .send(Err(VoiceError::Synthesis(
                    "superseded by a newer utterance".to_string(),
                )));
        }

        match self.synthesizer.speak(&text).await {
            Ok(completion) => {
                if self.machine.current() == SessionState::Processing {
                    self.transition(SessionState::Speaking);
                }
                self.pending_speech = Some(PendingSpeech { completion, done });
            }
            Err(e) => {
                self.metrics.synthesis_errors.fetch_add(1, Ordering::Relaxed);
                self.events.emit(SessionEvent::Error {
                    message: e.to_string(),
                    recoverable: true,
                });
                let _ = done.send(Err(VoiceError::Synthesis(e.to_string())));
                // Failure path terminates in Idle; any queued restart is skipped.
                self.transition(SessionState::Idle);
            }
        }
    }

    async fn handle_recognizer_event(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Started => {
                debug!("Recognizer reports capture started");
            }
            RecognizerEvent::Interim { utterance_id, text } => {
                if self.machine.current() != SessionState::Listening {
                    return;
                }
                self.metrics.interim_count.fetch_add(1, Ordering::Relaxed);
                self.watchdog.reset();
                if self.config.read().forward_interim {
                    self.events.emit(SessionEvent::Interim { utterance_id, text });
                }
            }
            RecognizerEvent::Final { utterance_id, text } => {
                if self.machine.current() != SessionState::Listening {
                    debug!("Final transcript outside listening; dropped");
                    return;
                }
                self.metrics.final_count.fetch_add(1, Ordering::Relaxed);
                self.watchdog.cancel();
                self.recognizer.stop().await;
                self.auto_retries = 0;
                self.transition(SessionState::Processing);
                // Hand the utterance to the host; it answers with speak().
                self.events.emit(SessionEvent::Final { utterance_id, text });
            }
            RecognizerEvent::Error { error } => {
                if self.machine.current() != SessionState::Listening {
                    debug!("Recognizer error outside listening; dropped: {}", error);
                    return;
                }
                self.metrics
                    .recognition_errors
                    .fetch_add(1, Ordering::Relaxed);
                self.watchdog.cancel();
                self.recognizer.stop().await;
                self.enter_error(error);
            }
            RecognizerEvent::Ended => {
                if self.machine.current() != SessionState::Listening {
                    return;
                }
                if !self.session_active() || self.overlay_open {
                    debug!("Recognizer ended; restart gated off");
                    return;
                }
                // The platform gave up without a final (e.g. its own
                // timeout). Keep the session listening.
                info!("Recognizer ended mid-session; restarting");
                self.metrics.restarts.fetch_add(1, Ordering::Relaxed);
                self.recognizer.stop().await;
                match self.recognizer.start(self.recognizer_tx.clone()).await {
                    Ok(()) => self.watchdog.reset(),
                    Err(e) => self.enter_error(e),
                }
            }
        }
    }

    async fn handle_silence_timeout(&mut self) {
        if self.machine.current() != SessionState::Listening {
            return;
        }
        self.metrics.watchdog_fires.fetch_add(1, Ordering::Relaxed);
        info!("Silence timeout; stopping listening");
        self.recognizer.stop().await;
        self.set_session_active(false);
        self.stop_monitor();
        self.transition(SessionState::Idle);
    }

    async fn handle_speech_result(
        &mut self,
        done: oneshot::Sender<Result<(), VoiceError>>,
        result: Result<(), TtsError>,
    ) {
        match result {
            Ok(()) => {
                self.metrics
                    .utterances_spoken
                    .fetch_add(1, Ordering::Relaxed);
                let _ = done.send(Ok(()));
                if self.session_active() && !self.overlay_open {
                    self.metrics.restarts.fetch_add(1, Ordering::Relaxed);
                    match self.recognizer.start(self.recognizer_tx.clone()).await {
                        Ok(()) => {
                            self.transition(SessionState::Listening);
                            self.watchdog.reset();
                        }
                        Err(e) => {
                            self.transition(SessionState::Idle);
                            self.enter_error(e);
                        }
                    }
                } else {
                    info!("Restart gated off (session stopped or overlay open)");
                    self.set_session_active(false);
                    self.transition(SessionState::Idle);
                }
            }
            Err(TtsError::Cancelled) => {
                let _ = done.send(Err(VoiceError::Synthesis(
                    "utterance cancelled".to_string(),
                )));
                if self.machine.current() == SessionState::Speaking {
                    self.transition(SessionState::Idle);
                }
            }
            Err(e) => {
                self.metrics.synthesis_errors.fetch_add(1, Ordering::Relaxed);
                self.events.emit(SessionEvent::Error {
                    message: e.to_string(),
                    recoverable: true,
                });
                let _ = done.send(Err(VoiceError::Synthesis(e.to_string())));
                // Back to Idle; the queued restart is skipped.
                self.transition(SessionState::Idle);
            }
        }
    }

    async fn handle_error_retry(&mut self) {
        self.retry_at = None;
        if self.machine.current() != SessionState::Error || !self.session_active() {
            return;
        }
        if self.overlay_open {
            // Keep polling until the overlay closes; does not consume the
            // retry budget.
            debug!("Retry due but overlay open; deferring");
            self.retry_at = Some(Instant::now() + self.config.read().error_retry_delay);
            return;
        }
        info!("Auto-retrying listening after error");
        if let Err(e) = self.begin_listening().await {
            debug!("Auto-retry failed: {}", e);
        }
    }

    /// Start recognition and claim `Listening` only once it is live.
    async fn begin_listening(&mut self) -> Result<(), VoiceError> {
        match self.recognizer.start(self.recognizer_tx.clone()).await {
            Ok(()) => {
                if self.machine.current() != SessionState::Listening {
                    self.transition(SessionState::Listening);
                }
                self.watchdog.reset();
                Ok(())
            }
            Err(error) => {
                let voice_error = self.classify(&error);
                self.enter_error(error);
                Err(voice_error)
            }
        }
    }

    fn classify(&self, error: &RecognizerError) -> VoiceError {
        match error {
            RecognizerError::Unsupported(reason) => VoiceError::Unsupported {
                feature: "speech recognition".to_string(),
                reason: reason.clone(),
            },
            RecognizerError::PermissionDenied => VoiceError::Audio(AudioError::PermissionDenied),
            other => VoiceError::Recognition {
                message: other.to_string(),
                recoverable: other.is_recoverable(),
            },
        }
    }

    /// Route a recognizer failure into its terminal state: disabled,
    /// permission-dead, or retryable `Error`.
    fn enter_error(&mut self, error: RecognizerError) {
        match error {
            RecognizerError::Unsupported(reason) => {
                if self.disabled.is_none() {
                    self.disabled = Some(reason.clone());
                    self.events.emit(SessionEvent::Disabled { reason });
                }
                self.set_session_active(false);
                self.to_idle();
            }
            RecognizerError::PermissionDenied => {
                self.events.emit(SessionEvent::Error {
                    message: "Microphone permission denied".to_string(),
                    recoverable: false,
                });
                self.set_session_active(false);
                self.to_idle();
            }
            error => {
                self.events.emit(SessionEvent::Error {
                    message: error.to_string(),
                    recoverable: true,
                });
                if self.machine.current() != SessionState::Error {
                    self.transition(SessionState::Error);
                }
                let config = self.config.read();
                if self.auto_retries < config.max_auto_retries {
                    self.auto_retries += 1;
                    self.retry_at = Some(Instant::now() + config.error_retry_delay);
                    debug!(
                        attempt = self.auto_retries,
                        "Scheduled silent auto-retry"
                    );
                } else {
                    info!("Auto-retry budget exhausted; waiting for manual restart");
                    self.retry_at = None;
                }
            }
        }
    }

    /// Full user/host-initiated close. Clears the active flag first so any
    /// event already in flight cannot trigger a zombie restart.
    async fn close_session(&mut self) {
        info!("Session stop requested");
        self.set_session_active(false);
        self.retry_at = None;
        self.auto_retries = 0;
        self.watchdog.cancel();
        self.recognizer.stop().await;
        if let Some(pending) = self.pending_speech.take() {
            let _ = pending.done.send(Err(VoiceError::SessionClosed));
        }
        self.synthesizer.cancel().await;
        self.stop_monitor();
        self.to_idle();
    }

    fn apply_config_update(&mut self, update: VoiceModeUpdate) {
        let mut config = self.config.write();
        update.apply(&mut config);
        self.watchdog.set_timeout(config.silence_timeout);
        self.synthesizer
            .set_preferred_voice(config.preferred_voice.clone());
        self.synthesizer.set_language(config.language.clone());
    }

    async fn ensure_monitor(&mut self) {
        if self.monitor.is_some() {
            return;
        }
        let Some(monitor_config) = self.monitor_config.clone() else {
            return;
        };
        let metrics = self.metrics.clone();
        let started =
            tokio::task::spawn_blocking(move || LevelMonitor::start(monitor_config, metrics))
                .await;
        match started {
            Ok(Ok((monitor, mut monitor_rx))) => {
                self.monitor = Some(monitor);
                let level_tx = self.level_tx.clone();
                tokio::spawn(async move {
                    while monitor_rx.changed().await.is_ok() {
                        let level = *monitor_rx.borrow();
                        if level_tx.send(level).is_err() {
                            break;
                        }
                    }
                    let _ = level_tx.send(0.0);
                });
            }
            Ok(Err(e)) => {
                // Non-fatal: the session listens without a level feed.
                warn!("Level monitor unavailable: {}", e);
                self.events.emit(SessionEvent::MonitorUnavailable {
                    reason: e.to_string(),
                });
            }
            Err(e) => warn!("Level monitor startup task failed: {}", e),
        }
    }

    fn stop_monitor(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        let _ = self.level_tx.send(0.0);
    }

    fn to_idle(&mut self) {
        if self.machine.current() != SessionState::Idle {
            self.transition(SessionState::Idle);
        }
    }

    fn transition(&mut self, to: SessionState) {
        match self.machine.transition(to) {
            Ok(from) => {
                let _ = self.state_tx.send(to);
                self.metrics.record_transition();
                self.events.emit(SessionEvent::StateChanged { from, to });
            }
            Err(e) => warn!("{}", e),
        }
    }

    fn session_active(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }

    fn set_session_active(&mut self, active: bool) {
        self.session_active.store(active, Ordering::SeqCst);
    }

    async fn teardown(&mut self) {
        debug!("Controller task tearing down");
        self.close_session().await;
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365)
}
