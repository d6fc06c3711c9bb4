//! Microphone capture and loudness monitoring.
//!
//! The level monitor owns the only microphone stream in the process. It runs
//! on a dedicated thread (cpal streams are not `Send`), extracts a decaying
//! RMS estimate on a fixed cadence, and publishes it on a `watch` channel for
//! the visualizer and anyone else who cares about the latest value.

pub mod level;
pub mod monitor;
pub mod ring_buffer;

pub use level::LevelExtractor;
pub use monitor::{LevelMonitor, LevelMonitorConfig};
pub use ring_buffer::{SampleConsumer, SampleProducer, SampleRing};
