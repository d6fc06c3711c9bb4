use serde::{Deserialize, Serialize};

use voxorb_session::SessionState;

/// Linear RGB color, components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }
}

/// Per-state visual parameters. Configuration, not business logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbStateStyle {
    pub color: Rgb,
    /// Pulse cycles per second.
    pub pulse_speed: f32,
    /// Jitter amplitude as a fraction of the base radius.
    pub jitter: f32,
    /// How strongly the audio level inflates the radius.
    pub radius_gain: f32,
}

/// Theme table mapping each session state to its look.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbTheme {
    pub idle: OrbStateStyle,
    pub listening: OrbStateStyle,
    pub processing: OrbStateStyle,
    pub speaking: OrbStateStyle,
    pub error: OrbStateStyle,
    /// Orb radius at zero level, in render units.
    pub base_radius: f32,
    /// Fraction of the remaining gap closed per frame at the reference
    /// 60 fps cadence. Bounds how fast any visual parameter may move.
    pub smoothing: f32,
    pub max_particles: usize,
    /// Particles per second at full level.
    pub particle_spawn_rate: f32,
}

impl OrbTheme {
    pub fn style(&self, state: SessionState) -> &OrbStateStyle {
        match state {
            SessionState::Idle => &self.idle,
            SessionState::Listening => &self.listening,
            SessionState::Processing => &self.processing,
            SessionState::Speaking => &self.speaking,
            SessionState::Error => &self.error,
        }
    }
}

impl Default for OrbTheme {
    fn default() -> Self {
        Self {
            idle: OrbStateStyle {
                color: Rgb::new(0.35, 0.38, 0.48),
                pulse_speed: 0.25,
                jitter: 0.01,
                radius_gain: 0.1,
            },
            listening: OrbStateStyle {
                color: Rgb::new(0.18, 0.62, 0.95),
                pulse_speed: 0.8,
                jitter: 0.03,
                radius_gain: 0.6,
            },
            processing: OrbStateStyle {
                color: Rgb::new(0.85, 0.65, 0.13),
                pulse_speed: 1.6,
                jitter: 0.05,
                radius_gain: 0.2,
            },
            speaking: OrbStateStyle {
                color: Rgb::new(0.22, 0.8, 0.46),
                pulse_speed: 1.1,
                jitter: 0.02,
                radius_gain: 0.5,
            },
            error: OrbStateStyle {
                color: Rgb::new(0.86, 0.21, 0.27),
                pulse_speed: 0.5,
                jitter: 0.08,
                radius_gain: 0.1,
            },
            base_radius: 48.0,
            smoothing: 0.2,
            max_particles: 96,
            particle_spawn_rate: 40.0,
        }
    }
}
