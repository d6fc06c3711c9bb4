use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

use voxorb_audio::LevelMonitorConfig;
use voxorb_orb::{OrbRenderer, OrbTheme, OrbVisualState};
use voxorb_session::{
    VoiceModeConfig, VoiceSessionController, VoiceSessionOptions,
};
use voxorb_stt::RecognizerEngine;
use voxorb_telemetry::SessionMetrics;
use voxorb_tts::SynthesizerEngine;

/// How often the orb feed renders a frame.
const ORB_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Options for starting the Voxorb runtime.
#[derive(Clone, Debug)]
pub struct AppRuntimeOptions {
    /// Input device for the loudness monitor; `None` is the system default.
    pub device: Option<String>,
    /// Run without microphone level monitoring (headless / CI).
    pub disable_monitor: bool,
    pub config: VoiceModeConfig,
    pub theme: OrbTheme,
}

impl Default for AppRuntimeOptions {
    fn default() -> Self {
        Self {
            device: None,
            disable_monitor: false,
            config: VoiceModeConfig::default(),
            theme: OrbTheme::default(),
        }
    }
}

/// Handle to the running application pipeline.
pub struct AppHandle {
    pub controller: VoiceSessionController,
    pub metrics: SessionMetrics,
    pub orb: OrbFeed,
}

impl AppHandle {
    /// Assemble the pipeline: session controller, level monitor wiring,
    /// and the orb render feed.
    pub fn start(
        recognizer: Box<dyn RecognizerEngine>,
        synthesizer: Box<dyn SynthesizerEngine>,
        options: AppRuntimeOptions,
    ) -> Self {
        let metrics = SessionMetrics::new();
        let monitor = if options.disable_monitor {
            None
        } else {
            Some(LevelMonitorConfig {
                device: options.device.clone(),
                ..Default::default()
            })
        };

        let controller = VoiceSessionController::spawn(
            recognizer,
            synthesizer,
            VoiceSessionOptions {
                config: options.config.clone(),
                monitor,
                metrics: metrics.clone(),
            },
        );

        let orb = OrbFeed::spawn(&controller, options.theme.clone());
        info!("Voxorb runtime assembled");

        Self {
            controller,
            metrics,
            orb,
        }
    }

    /// Gracefully stop the pipeline and wait for task teardown.
    pub async fn shutdown(self) {
        info!("Shutting down Voxorb runtime...");
        self.orb.stop();
        self.controller.shutdown().await;
        info!("Voxorb runtime shutdown complete");
    }

    /// Wait for a shutdown signal (Ctrl+C).
    pub async fn wait_for_shutdown_signal() {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, initiating graceful shutdown"),
            Err(err) => error!("Failed to listen for SIGINT: {}", err),
        }
    }
}

/// Continuously rendered orb frame, shared with whatever draws it.
///
/// The feed subscribes to the controller's state and level and advances an
/// [`OrbRenderer`] on a fixed cadence; the front-end just reads the latest
/// frame whenever it likes.
pub struct OrbFeed {
    visual: Arc<RwLock<OrbVisualState>>,
    handle: JoinHandle<()>,
}

impl OrbFeed {
    pub fn spawn(controller: &VoiceSessionController, theme: OrbTheme) -> Self {
        let state_rx = controller.state_watch();
        let level_rx = controller.level_watch();
        let mut renderer = OrbRenderer::new(theme);
        let visual = Arc::new(RwLock::new(renderer.visual().clone()));
        let slot = Arc::downgrade(&visual);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ORB_FRAME_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last = tokio::time::Instant::now();
            loop {
                ticker.tick().await;
                let Some(slot) = slot.upgrade() else { break };

                let now = tokio::time::Instant::now();
                let dt = now - last;
                last = now;

                let state = *state_rx.borrow();
                let level = *level_rx.borrow();
                *slot.write() = renderer.advance(state, level, dt).clone();
            }
        });

        Self { visual, handle }
    }

    /// Latest rendered frame.
    pub fn frame(&self) -> OrbVisualState {
        self.visual.read().clone()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxorb_session::SessionState;
    use voxorb_stt::mock::MockRecognizer;
    use voxorb_tts::mock::MockSynthesizer;

    fn headless_options() -> AppRuntimeOptions {
        AppRuntimeOptions {
            disable_monitor: true,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_assembles_and_shuts_down() {
        let (recognizer, _rec) = MockRecognizer::new();
        let (synthesizer, _synth) = MockSynthesizer::new();
        let handle = AppHandle::start(
            Box::new(recognizer),
            Box::new(synthesizer),
            headless_options(),
        );

        handle.controller.start().await.unwrap();
        assert_eq!(handle.controller.state(), SessionState::Listening);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn orb_feed_tracks_session_state() {
        let (recognizer, _rec) = MockRecognizer::new();
        let (synthesizer, _synth) = MockSynthesizer::new();
        let handle = AppHandle::start(
            Box::new(recognizer),
            Box::new(synthesizer),
            headless_options(),
        );

        let idle_target = handle.orb.frame().target_color;
        handle.controller.start().await.unwrap();

        // A couple of frames after the transition, the orb is gliding
        // toward the listening color.
        tokio::time::advance(ORB_FRAME_INTERVAL * 4).await;
        tokio::task::yield_now().await;
        let frame = handle.orb.frame();
        assert_ne!(frame.target_color, idle_target);

        handle.shutdown().await;
    }
}
