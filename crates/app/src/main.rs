use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use voxorb_app::{AppHandle, AppRuntimeOptions};
use voxorb_session::{SessionEvent, SessionState, VoiceModeConfig};
use voxorb_stt::mock::MockRecognizer;
use voxorb_tts::mock::MockSynthesizer;

fn init_logging() -> Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "voxorb.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    info!("Starting Voxorb demo");

    // Scripted engines: each listening activation "hears" the next line,
    // and every reply takes a moment to speak.
    let (recognizer, _recognizer_handle) = MockRecognizer::scripted(
        [
            "hello there",
            "what can you do",
            "goodbye",
        ],
        Duration::from_millis(500),
    );
    let (synthesizer, _synthesizer_handle) =
        MockSynthesizer::auto_completing(Duration::from_millis(900));

    let options = AppRuntimeOptions {
        device: std::env::var("VOXORB_DEVICE").ok(),
        disable_monitor: std::env::var("VOXORB_NO_MONITOR").is_ok(),
        config: VoiceModeConfig {
            system_prompt: "You are a friendly demo assistant.".to_string(),
            conversation_id: Some("demo".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    let handle = AppHandle::start(Box::new(recognizer), Box::new(synthesizer), options);
    let mut events = handle.controller.subscribe();

    handle.controller.start().await?;
    info!("Session started; speak (the script) and watch the orb");

    loop {
        tokio::select! {
            _ = AppHandle::wait_for_shutdown_signal() => break,
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::Interim { text, .. }) => {
                        info!("(interim) {}", text);
                    }
                    Ok(SessionEvent::Final { text, .. }) => {
                        info!("heard: {}", text);
                        // Stand-in for the host's completion round-trip.
                        let reply = format!("You said: {}", text);
                        if let Err(e) = handle.controller.speak(reply).await {
                            warn!("Reply was not spoken: {}", e);
                        }
                    }
                    Ok(SessionEvent::StateChanged { to, .. }) => {
                        let frame = handle.orb.frame();
                        info!("state -> {} (orb radius {:.1})", to, frame.radius);
                        if to == SessionState::Idle && !handle.controller.is_session_active() {
                            info!("Session finished");
                            break;
                        }
                    }
                    Ok(SessionEvent::Error { message, recoverable }) => {
                        warn!("Voice error (recoverable: {}): {}", recoverable, message);
                    }
                    Ok(SessionEvent::Disabled { reason }) => {
                        warn!("Voice input unavailable: {}", reason);
                        break;
                    }
                    Ok(SessionEvent::MonitorUnavailable { reason }) => {
                        warn!("Level monitor unavailable: {}", reason);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event feed lagged; dropped {} events", n);
                    }
                    Err(_) => break,
                }
            }
        }
    }

    let metrics = handle.metrics.clone();
    handle.shutdown().await;
    info!(
        "Finals: {}, utterances spoken: {}, restarts: {}",
        metrics
            .final_count
            .load(std::sync::atomic::Ordering::Relaxed),
        metrics
            .utterances_spoken
            .load(std::sync::atomic::Ordering::Relaxed),
        metrics.restarts.load(std::sync::atomic::Ordering::Relaxed),
    );
    Ok(())
}
