use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::particles::ParticleField;
use crate::theme::{OrbTheme, Rgb};
use voxorb_session::SessionState;

/// Reference cadence the smoothing factor is defined against.
const REFERENCE_FPS: f32 = 60.0;

/// Render-only parameters, recomputed every frame. Never authoritative:
/// the session state and the level feed are the sources of truth.
#[derive(Debug, Clone)]
pub struct OrbVisualState {
    pub color: Rgb,
    pub target_color: Rgb,
    pub radius: f32,
    /// Pulse phase in [0, TAU).
    pub pulse_phase: f32,
    pub jitter_offset: (f32, f32),
}

/// Folds (session state, audio level, elapsed time) into the orb's visual
/// parameters once per animation frame.
pub struct OrbRenderer {
    theme: OrbTheme,
    visual: OrbVisualState,
    particles: ParticleField,
    rng: SmallRng,
}

impl OrbRenderer {
    pub fn new(theme: OrbTheme) -> Self {
        Self::with_seed(theme, 0x0b5e55ed)
    }

    /// Deterministic jitter/particles for tests.
    pub fn with_seed(theme: OrbTheme, seed: u64) -> Self {
        let visual = OrbVisualState {
            color: theme.idle.color,
            target_color: theme.idle.color,
            radius: theme.base_radius,
            pulse_phase: 0.0,
            jitter_offset: (0.0, 0.0),
        };
        let particles = ParticleField::new(theme.max_particles, theme.particle_spawn_rate);
        Self {
            theme,
            visual,
            particles,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Advance one frame. The color and radius close at most
    /// `smoothing * gap` (scaled to `dt`) per frame, so no visual parameter
    /// ever jumps discontinuously, whatever the inputs do.
    pub fn advance(&mut self, state: SessionState, level: f32, dt: Duration) -> &OrbVisualState {
        let style = self.theme.style(state).clone();
        let level = level.clamp(0.0, 1.0);
        let dt_secs = dt.as_secs_f32();
        let alpha = interpolation_factor(self.theme.smoothing, dt_secs);

        self.visual.target_color = style.color;
        self.visual.color = self.visual.color.lerp(style.color, alpha);

        let target_radius = self.theme.base_radius * (1.0 + level * style.radius_gain);
        self.visual.radius += (target_radius - self.visual.radius) * alpha;

        self.visual.pulse_phase = (self.visual.pulse_phase
            + style.pulse_speed * dt_secs * std::f32::consts::TAU)
            % std::f32::consts::TAU;

        let jitter = style.jitter * self.theme.base_radius;
        self.visual.jitter_offset = (
            self.rng.gen_range(-1.0..=1.0) * jitter,
            self.rng.gen_range(-1.0..=1.0) * jitter,
        );

        self.particles.advance(&mut self.rng, level, dt_secs);

        &self.visual
    }

    pub fn visual(&self) -> &OrbVisualState {
        &self.visual
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn theme(&self) -> &OrbTheme {
        &self.theme
    }

    /// Swap the theme without disturbing the animation state; the visuals
    /// glide to the new targets over the following frames.
    pub fn set_theme(&mut self, theme: OrbTheme) {
        self.particles = ParticleField::new(theme.max_particles, theme.particle_spawn_rate);
        self.theme = theme;
    }
}

/// Convert the per-frame-at-60fps smoothing fraction into one matched to
/// the actual frame time, so a dropped frame doesn't slow the glide.
fn interpolation_factor(smoothing: f32, dt_secs: f32) -> f32 {
    let frames = (dt_secs * REFERENCE_FPS).max(0.0);
    1.0 - (1.0 - smoothing.clamp(0.0, 1.0)).powf(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_micros(16_667);

    #[test]
    fn radius_smooths_toward_level_without_jumps() {
        let theme = OrbTheme::default();
        let smoothing = theme.smoothing;
        let base = theme.base_radius;
        let gain = theme.listening.radius_gain;
        let mut renderer = OrbRenderer::with_seed(theme, 1);

        let mut previous = renderer.visual().radius;
        for level in [0.2f32, 0.4, 0.6, 0.8, 1.0] {
            let target = base * (1.0 + level * gain);
            let visual = renderer.advance(SessionState::Listening, level, FRAME);

            let step = (visual.radius - previous).abs();
            let allowed = interpolation_factor(smoothing, FRAME.as_secs_f32())
                * (target - previous).abs()
                + 1e-4;
            assert!(
                step <= allowed,
                "frame step {} exceeds interpolation bound {}",
                step,
                allowed
            );
            // Rising levels pull the radius monotonically upward.
            assert!(visual.radius >= previous - 1e-4);
            previous = visual.radius;
        }
    }

    #[test]
    fn color_converges_to_the_state_target() {
        let theme = OrbTheme::default();
        let target = theme.listening.color;
        let mut renderer = OrbRenderer::with_seed(theme, 1);

        for _ in 0..240 {
            renderer.advance(SessionState::Listening, 0.0, FRAME);
        }
        let color = renderer.visual().color;
        assert!((color.r - target.r).abs() < 1e-2);
        assert!((color.g - target.g).abs() < 1e-2);
        assert!((color.b - target.b).abs() < 1e-2);
    }

    #[test]
    fn state_change_retargets_but_does_not_teleport() {
        let theme = OrbTheme::default();
        let mut renderer = OrbRenderer::with_seed(theme, 1);
        for _ in 0..240 {
            renderer.advance(SessionState::Listening, 0.5, FRAME);
        }
        let before = renderer.visual().color;

        let visual = renderer.advance(SessionState::Error, 0.5, FRAME);
        assert_eq!(visual.target_color, OrbTheme::default().error.color);
        // One frame moves only a fraction of the way.
        assert!((visual.color.r - before.r).abs() < 0.5);
        assert_ne!(visual.color, visual.target_color);
    }

    #[test]
    fn extreme_levels_are_clamped() {
        let theme = OrbTheme::default();
        let base = theme.base_radius;
        let gain = theme.listening.radius_gain;
        let mut renderer = OrbRenderer::with_seed(theme, 1);

        for _ in 0..600 {
            renderer.advance(SessionState::Listening, 42.0, FRAME);
        }
        // Never overshoots the radius a level of 1.0 would produce.
        assert!(renderer.visual().radius <= base * (1.0 + gain) + 1e-3);

        for _ in 0..600 {
            renderer.advance(SessionState::Listening, -42.0, FRAME);
        }
        assert!(renderer.visual().radius >= base - 1e-3);
    }

    #[test]
    fn pulse_phase_stays_in_range() {
        let mut renderer = OrbRenderer::with_seed(OrbTheme::default(), 1);
        for _ in 0..1000 {
            let visual = renderer.advance(SessionState::Processing, 0.3, FRAME);
            assert!((0.0..std::f32::consts::TAU).contains(&visual.pulse_phase));
        }
    }

    #[test]
    fn jitter_respects_the_state_amplitude() {
        let theme = OrbTheme::default();
        let amplitude = theme.error.jitter * theme.base_radius;
        let mut renderer = OrbRenderer::with_seed(theme, 1);
        for _ in 0..100 {
            let visual = renderer.advance(SessionState::Error, 0.0, FRAME);
            assert!(visual.jitter_offset.0.abs() <= amplitude + 1e-6);
            assert!(visual.jitter_offset.1.abs() <= amplitude + 1e-6);
        }
    }

    #[test]
    fn particles_follow_the_level_feed() {
        let mut renderer = OrbRenderer::with_seed(OrbTheme::default(), 1);
        for _ in 0..120 {
            renderer.advance(SessionState::Speaking, 1.0, FRAME);
        }
        let cap = renderer.theme().max_particles;
        assert!(renderer.particles().len() > 0);
        assert!(renderer.particles().len() <= cap);
    }
}
