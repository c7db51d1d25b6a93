//! Seedable perturbation source.
//!
//! Tick jitter and archetype scoring take their variability from here
//! rather than a thread-local RNG, so a fixed seed (or a silent source)
//! makes every pass reproducible.

use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub struct NoiseSource {
    rng: Mutex<SmallRng>,
    amplitude: f64,
}

impl NoiseSource {
    /// Deterministic source: same seed, same sequence.
    pub fn seeded(seed: u64, amplitude: f64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
            amplitude: amplitude.max(0.0),
        }
    }

    /// Entropy-seeded source.
    pub fn from_os_rng(amplitude: f64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_os_rng()),
            amplitude: amplitude.max(0.0),
        }
    }

    /// Always returns 0.
    pub fn silent() -> Self {
        Self::seeded(0, 0.0)
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Uniform sample in [-amplitude, amplitude].
    pub fn sample(&self) -> f64 {
        if self.amplitude == 0.0 {
            return 0.0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let unit: f64 = rng.random();
        (unit * 2.0 - 1.0) * self.amplitude
    }
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSource")
            .field("amplitude", &self.amplitude)
            .finish_non_exhaustive()
    }
}
