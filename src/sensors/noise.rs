//! Zero-mean Gaussian noise for emulated sensor readings.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Adds independent zero-mean Gaussian samples to a fixed number of values.
///
/// Each instance owns its generator; samples are drawn sequentially and the
/// generator is never reseeded between calls.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    size: usize,
    std_dev: f32,
    rng: StdRng,
}

impl GaussianNoise {
    /// Noise source for `size` values with standard deviation `std_dev`,
    /// seeded from OS entropy.
    #[must_use]
    pub fn new(size: usize, std_dev: f32) -> Self {
        Self::with_rng(size, std_dev, StdRng::from_entropy())
    }

    /// Deterministic noise source for reproducible runs.
    #[must_use]
    pub fn seeded(size: usize, std_dev: f32, seed: u64) -> Self {
        Self::with_rng(size, std_dev, StdRng::seed_from_u64(seed))
    }

    fn with_rng(size: usize, std_dev: f32, rng: StdRng) -> Self {
        Self {
            size,
            std_dev: std_dev.max(0.0),
            rng,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn std_dev(&self) -> f32 {
        self.std_dev
    }

    /// Perturbs the first `size` entries of `values` in place.
    ///
    /// Slices shorter than `size` are perturbed in full.
    pub fn add_noise(&mut self, values: &mut [f32]) {
        if self.std_dev == 0.0 {
            return;
        }
        for value in values.iter_mut().take(self.size) {
            *value += self.sample();
        }
    }

    /// Draws one sample using the Box-Muller transform.
    pub fn sample(&mut self) -> f32 {
        if self.std_dev == 0.0 {
            return 0.0;
        }
        let u1: f32 = self.rng.gen::<f32>().max(f32::EPSILON);
        let u2: f32 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
        z * self.std_dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_std_dev_is_noop() {
        let mut noise = GaussianNoise::new(3, 0.0);
        let mut values = [1.0, 2.0, 3.0];
        noise.add_noise(&mut values);
        assert_eq!(values, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_negative_std_dev_clamped() {
        let noise = GaussianNoise::new(3, -1.0);
        assert_eq!(noise.std_dev(), 0.0);
    }

    #[test]
    fn test_only_first_size_values_perturbed() {
        let mut noise = GaussianNoise::seeded(2, 0.5, 7);
        let mut values = [0.0; 4];
        noise.add_noise(&mut values);
        assert!(values[0] != 0.0 || values[1] != 0.0);
        assert_eq!(values[2], 0.0);
        assert_eq!(values[3], 0.0);
    }

    #[test]
    fn test_short_slice_is_safe() {
        let mut noise = GaussianNoise::seeded(4, 0.5, 7);
        let mut values = [0.0; 2];
        noise.add_noise(&mut values);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = GaussianNoise::seeded(3, 0.2, 42);
        let mut b = GaussianNoise::seeded(3, 0.2, 42);
        for _ in 0..10 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_generator_state_advances() {
        let mut noise = GaussianNoise::seeded(1, 1.0, 3);
        let first = noise.sample();
        let second = noise.sample();
        assert_ne!(first, second);
    }

    #[test]
    fn test_sample_statistics() {
        let mut noise = GaussianNoise::seeded(1, 0.5, 1234);
        let n = 20_000;
        let samples: Vec<f32> = (0..n).map(|_| noise.sample()).collect();

        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>() / n as f32;

        assert!(mean.abs() < 0.02, "mean {}", mean);
        assert!((var.sqrt() - 0.5).abs() < 0.02, "std dev {}", var.sqrt());
    }
}
