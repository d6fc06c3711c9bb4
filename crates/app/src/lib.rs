//! Voxorb application wiring: runtime assembly around the session
//! controller, plus the orb render feed a front-end consumes.

pub mod runtime;

pub use runtime::{AppHandle, AppRuntimeOptions, OrbFeed};
