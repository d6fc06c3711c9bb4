use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared metrics for cross-task session monitoring.
///
/// Everything is lock-free except the last-transition timestamp; writers sit
/// on hot paths (audio callback, controller select loop) and must not block.
#[derive(Clone, Default)]
pub struct SessionMetrics {
    // Audio level monitoring
    pub current_level_milli: Arc<AtomicU64>, // level * 1000 for precision
    pub frames_captured: Arc<AtomicU64>,
    pub samples_dropped: Arc<AtomicU64>,

    // Transcript counters
    pub interim_count: Arc<AtomicU64>,
    pub final_count: Arc<AtomicU64>,

    // Session lifecycle
    pub sessions_started: Arc<AtomicU64>,
    pub restarts: Arc<AtomicU64>,
    pub watchdog_fires: Arc<AtomicU64>,
    pub utterances_spoken: Arc<AtomicU64>,

    // Error tracking
    pub recognition_errors: Arc<AtomicU64>,
    pub synthesis_errors: Arc<AtomicU64>,

    pub transitions: Arc<AtomicUsize>,
    pub last_transition: Arc<RwLock<Option<Instant>>>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_level(&self, level: f32) {
        let milli = (level.clamp(0.0, 1.0) * 1000.0) as u64;
        self.current_level_milli.store(milli, Ordering::Relaxed);
    }

    pub fn current_level(&self) -> f32 {
        self.current_level_milli.load(Ordering::Relaxed) as f32 / 1000.0
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        *self.last_transition.write() = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_round_trips_through_milli_units() {
        let metrics = SessionMetrics::new();
        metrics.record_level(0.5);
        assert!((metrics.current_level() - 0.5).abs() < 0.001);
    }

    #[test]
    fn level_is_clamped_before_storage() {
        let metrics = SessionMetrics::new();
        metrics.record_level(7.0);
        assert!((metrics.current_level() - 1.0).abs() < 0.001);
        metrics.record_level(-3.0);
        assert_eq!(metrics.current_level(), 0.0);
    }

    #[test]
    fn transition_recording_updates_timestamp() {
        let metrics = SessionMetrics::new();
        assert!(metrics.last_transition.read().is_none());
        metrics.record_transition();
        assert_eq!(metrics.transitions.load(Ordering::Relaxed), 1);
        assert!(metrics.last_transition.read().is_some());
    }
}
