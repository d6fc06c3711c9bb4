use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::level::LevelExtractor;
use crate::ring_buffer::SampleRing;
use voxorb_foundation::AudioError;
use voxorb_telemetry::SessionMetrics;

/// Configuration for the loudness monitor.
#[derive(Debug, Clone)]
pub struct LevelMonitorConfig {
    /// Input device name; `None` uses the system default.
    pub device: Option<String>,
    /// Analysis window in samples (power of two).
    pub window_size: usize,
    /// How often the level is recomputed and published.
    pub update_interval: Duration,
    /// Multiplier applied to the raw RMS before clamping.
    pub gain: f32,
    /// Per-tick falloff of the published level.
    pub decay: f32,
}

impl Default for LevelMonitorConfig {
    fn default() -> Self {
        Self {
            device: None,
            window_size: 512,
            update_interval: Duration::from_millis(50),
            gain: 1.6,
            decay: 0.85,
        }
    }
}

/// Handle to the microphone loudness monitor.
///
/// Owns the only live microphone stream in the process. The stream lives on
/// a dedicated thread because cpal streams are not `Send`; the thread drains
/// the sample ring on a fixed cadence and publishes a clamped [0, 1] level.
pub struct LevelMonitor {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    level_tx: Arc<watch::Sender<f32>>,
}

impl LevelMonitor {
    /// Start capturing. Fails fast with a classified error if the device is
    /// missing or access is denied; the caller treats that as non-fatal to
    /// recognition.
    pub fn start(
        config: LevelMonitorConfig,
        metrics: SessionMetrics,
    ) -> Result<(Self, watch::Receiver<f32>), AudioError> {
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let level_tx = Arc::new(level_tx);
        let shutdown = Arc::new(AtomicBool::new(false));

        let startup: Arc<RwLock<Option<Result<(), AudioError>>>> = Arc::new(RwLock::new(None));
        let startup_thread = startup.clone();
        let shutdown_thread = shutdown.clone();
        let level_tx_thread = level_tx.clone();

        let handle = thread::Builder::new()
            .name("level-monitor".to_string())
            .spawn(move || {
                run_capture(
                    config,
                    metrics,
                    level_tx_thread,
                    shutdown_thread,
                    startup_thread,
                );
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn monitor thread: {}", e)))?;

        // Wait for the stream to come up (or fail) with a bounded timeout.
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            if let Some(result) = startup.write().take() {
                match result {
                    Ok(()) => break,
                    Err(e) => {
                        let _ = handle.join();
                        return Err(e);
                    }
                }
            }
            if Instant::now() >= deadline {
                shutdown.store(true, Ordering::Relaxed);
                let _ = handle.join();
                return Err(AudioError::Fatal(
                    "Timed out waiting for capture stream".to_string(),
                ));
            }
            thread::sleep(Duration::from_millis(10));
        }

        info!("Level monitor started");
        Ok((
            Self {
                shutdown,
                handle: Some(handle),
                level_tx,
            },
            level_rx,
        ))
    }

    /// Latest-value level feed; receivers see every published update's
    /// most recent value.
    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.level_tx.subscribe()
    }

    /// Stop capturing and release the stream. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            let _ = self.level_tx.send(0.0);
            info!("Level monitor stopped");
        }
    }
}

impl Drop for LevelMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture(
    config: LevelMonitorConfig,
    metrics: SessionMetrics,
    level_tx: Arc<watch::Sender<f32>>,
    shutdown: Arc<AtomicBool>,
    startup: Arc<RwLock<Option<Result<(), AudioError>>>>,
) {
    // Ring sized for ~0.5 s of audio at 48 kHz; overruns drop, never block.
    let (producer, mut consumer) = SampleRing::new(32768).split();
    let producer = Arc::new(parking_lot::Mutex::new(producer));

    let stream_failed = Arc::new(AtomicBool::new(false));
    let stream = match build_stream(&config, producer, stream_failed.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            *startup.write() = Some(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        *startup.write() = Some(Err(e.into()));
        return;
    }
    *startup.write() = Some(Ok(()));

    let mut extractor = LevelExtractor::new(config.window_size, config.gain, config.decay);
    let mut scratch: Vec<f32> = Vec::with_capacity(config.window_size * 4);

    while !shutdown.load(Ordering::Relaxed) && !stream_failed.load(Ordering::Relaxed) {
        thread::sleep(config.update_interval);

        scratch.clear();
        let read = consumer.drain_into(&mut scratch);
        if read > 0 {
            extractor.push_samples(&scratch);
            metrics.frames_captured.fetch_add(1, Ordering::Relaxed);
        }
        metrics
            .samples_dropped
            .store(consumer.dropped(), Ordering::Relaxed);

        let level = extractor.tick();
        metrics.record_level(level);
        if level_tx.send(level).is_err() {
            debug!("All level receivers dropped; monitor exiting");
            break;
        }
    }

    if stream_failed.load(Ordering::Relaxed) {
        warn!("Capture stream reported an error; level feed goes quiet");
        let _ = level_tx.send(0.0);
    }

    drop(stream);
}

fn build_stream(
    config: &LevelMonitorConfig,
    producer: Arc<parking_lot::Mutex<crate::ring_buffer::SampleProducer>>,
    stream_failed: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();

    let device = match &config.device {
        Some(name) => host
            .input_devices()
            .map_err(|e| AudioError::Fatal(format!("Failed to enumerate devices: {}", e)))?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceUnavailable {
                name: Some(name.clone()),
            })?,
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceUnavailable { name: None })?,
    };

    let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
    let supported = device.default_input_config()?;
    let channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    debug!(
        "Opening input device '{}' ({} ch, {} Hz, {:?})",
        device_name, channels, stream_config.sample_rate.0, sample_format
    );

    let err_fn = {
        let stream_failed = stream_failed.clone();
        move |err: cpal::StreamError| {
            warn!("Capture stream error: {}", err);
            stream_failed.store(true, Ordering::Relaxed);
        }
    };

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    push_mono(&producer, data, channels);
                },
                err_fn,
                None,
            )
            .map_err(classify_build_error)?,
        SampleFormat::I16 => device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    push_mono(&producer, &floats, channels);
                },
                err_fn,
                None,
            )
            .map_err(classify_build_error)?,
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            })
        }
    };

    Ok(stream)
}

/// Downmix interleaved frames to mono and push them into the ring.
fn push_mono(
    producer: &Arc<parking_lot::Mutex<crate::ring_buffer::SampleProducer>>,
    data: &[f32],
    channels: usize,
) {
    let mut guard = producer.lock();
    if channels <= 1 {
        let _ = guard.push(data);
        return;
    }
    let mono: Vec<f32> = data
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    let _ = guard.push(&mono);
}

/// Translate cpal's build errors into the monitor's taxonomy. Backends
/// report denied microphone access as a backend-specific message rather
/// than a dedicated variant, so the text is inspected here, once, at the
/// wrapper boundary.
fn classify_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            AudioError::DeviceUnavailable { name: None }
        }
        cpal::BuildStreamError::BackendSpecific { err } => {
            let description = err.description.to_lowercase();
            if description.contains("permission") || description.contains("denied") {
                AudioError::PermissionDenied
            } else {
                AudioError::Fatal(err.description)
            }
        }
        other => other.into(),
    }
}
