//! Animated orb visualization.
//!
//! A pure consumer of the controller's observable surface: every animation
//! frame it folds (session state, audio level, elapsed time) into render
//! parameters. Nothing here is authoritative; per-state visuals are a theme
//! table and can be reskinned without touching the session logic.

pub mod particles;
pub mod renderer;
pub mod theme;

pub use particles::{Particle, ParticleField};
pub use renderer::{OrbRenderer, OrbVisualState};
pub use theme::{OrbStateStyle, OrbTheme, Rgb};
