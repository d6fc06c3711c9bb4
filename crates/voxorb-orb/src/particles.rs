use rand::rngs::SmallRng;
use rand::Rng;

/// One drifting mote around the orb. Positions are in orb-radius units
/// relative to the center.
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Remaining lifetime in seconds.
    pub life: f32,
    pub size: f32,
}

/// Capped particle population whose spawn rate follows the audio level.
pub struct ParticleField {
    particles: Vec<Particle>,
    max: usize,
    spawn_rate: f32,
    spawn_accum: f32,
}

impl ParticleField {
    pub fn new(max: usize, spawn_rate: f32) -> Self {
        Self {
            particles: Vec::with_capacity(max),
            max,
            spawn_rate,
            spawn_accum: 0.0,
        }
    }

    /// Age, cull, and spawn for one frame. `level` in [0, 1] scales the
    /// spawn rate; a silent orb still sheds the occasional mote.
    pub fn advance(&mut self, rng: &mut SmallRng, level: f32, dt: f32) {
        for particle in &mut self.particles {
            particle.x += particle.vx * dt;
            particle.y += particle.vy * dt;
            particle.life -= dt;
        }
        self.particles.retain(|p| p.life > 0.0);

        let level = level.clamp(0.0, 1.0);
        self.spawn_accum += self.spawn_rate * (0.1 + 0.9 * level) * dt;
        while self.spawn_accum >= 1.0 {
            self.spawn_accum -= 1.0;
            if self.particles.len() >= self.max {
                continue;
            }
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let speed = rng.gen_range(0.2..0.9);
            self.particles.push(Particle {
                x: angle.cos() * 1.1,
                y: angle.sin() * 1.1,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: rng.gen_range(0.6..1.8),
                size: rng.gen_range(0.02..0.08),
            });
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.spawn_accum = 0.0;
    }
}
