/// Decaying RMS loudness extractor.
///
/// Keeps a rolling window of the most recent samples and, on each tick,
/// computes the root-mean-square of the centered waveform. The published
/// level falls back at `decay` per tick rather than dropping to the
/// instantaneous value, which keeps the visualization from flickering
/// between analysis windows.
pub struct LevelExtractor {
    window: Vec<f32>,
    window_size: usize,
    gain: f32,
    decay: f32,
    level: f32,
}

impl LevelExtractor {
    pub fn new(window_size: usize, gain: f32, decay: f32) -> Self {
        Self {
            window: Vec::with_capacity(window_size * 2),
            window_size,
            gain,
            decay,
            level: 0.0,
        }
    }

    /// Append captured samples, keeping only the newest `window_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.window.extend_from_slice(samples);
        if self.window.len() > self.window_size {
            let excess = self.window.len() - self.window_size;
            self.window.drain(..excess);
        }
    }

    /// Recompute the level from the current window. Always in [0, 1].
    pub fn tick(&mut self) -> f32 {
        let rms = Self::centered_rms(&self.window);
        let candidate = (rms * self.gain).clamp(0.0, 1.0);
        let decayed = self.level * self.decay;
        self.level = candidate.max(decayed).clamp(0.0, 1.0);
        self.level
    }

    pub fn current(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.level = 0.0;
    }

    /// RMS over the window with the DC offset removed, so a biased input
    /// (e.g. a capture path that never crosses zero) still reads as quiet.
    fn centered_rms(window: &[f32]) -> f32 {
        if window.is_empty() {
            return 0.0;
        }
        let mean: f32 = window.iter().sum::<f32>() / window.len() as f32;
        let sum_squares: f32 = window.iter().map(|s| (s - mean) * (s - mean)).sum();
        (sum_squares / window.len() as f32).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: usize = 512;

    #[test]
    fn silence_reads_zero() {
        let mut extractor = LevelExtractor::new(WINDOW, 1.0, 0.85);
        extractor.push_samples(&vec![0.0; WINDOW]);
        assert_eq!(extractor.tick(), 0.0);
    }

    #[test]
    fn all_max_amplitude_is_clamped_to_one() {
        let mut extractor = LevelExtractor::new(WINDOW, 4.0, 0.85);
        // Alternate full-scale so centering does not zero the window out.
        let samples: Vec<f32> = (0..WINDOW)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        extractor.push_samples(&samples);
        let level = extractor.tick();
        assert_eq!(level, 1.0);
    }

    #[test]
    fn all_min_amplitude_is_clamped() {
        let mut extractor = LevelExtractor::new(WINDOW, 4.0, 0.85);
        let samples: Vec<f32> = (0..WINDOW)
            .map(|i| if i % 2 == 0 { -1.0 } else { 1.0 })
            .collect();
        extractor.push_samples(&samples);
        let level = extractor.tick();
        assert!((0.0..=1.0).contains(&level));
        assert_eq!(level, 1.0);
    }

    #[test]
    fn dc_bias_does_not_register_as_loudness() {
        let mut extractor = LevelExtractor::new(WINDOW, 1.0, 0.85);
        extractor.push_samples(&vec![0.7; WINDOW]);
        assert!(extractor.tick() < 1e-6);
    }

    #[test]
    fn sine_wave_rms_is_amplitude_over_sqrt2() {
        let mut extractor = LevelExtractor::new(WINDOW, 1.0, 0.0);
        let sine: Vec<f32> = (0..WINDOW)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / WINDOW as f32;
                phase.sin() * 0.5
            })
            .collect();
        extractor.push_samples(&sine);
        let level = extractor.tick();
        assert!((level - 0.354).abs() < 0.01);
    }

    #[test]
    fn level_decays_between_loud_windows() {
        let mut extractor = LevelExtractor::new(WINDOW, 1.0, 0.85);
        let loud: Vec<f32> = (0..WINDOW)
            .map(|i| if i % 2 == 0 { 0.9 } else { -0.9 })
            .collect();
        extractor.push_samples(&loud);
        let peak = extractor.tick();

        extractor.push_samples(&vec![0.0; WINDOW]);
        let after_one = extractor.tick();
        assert!((after_one - peak * 0.85).abs() < 1e-4);

        extractor.push_samples(&vec![0.0; WINDOW]);
        let after_two = extractor.tick();
        assert!(after_two < after_one);
    }

    #[test]
    fn window_keeps_only_newest_samples() {
        let mut extractor = LevelExtractor::new(4, 1.0, 0.0);
        extractor.push_samples(&[0.9, -0.9, 0.9, -0.9]);
        extractor.push_samples(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(extractor.tick(), 0.0);
    }
}
