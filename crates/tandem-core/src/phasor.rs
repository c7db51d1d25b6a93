use serde::{Deserialize, Serialize};

use crate::constants::{EPSILON, PHI};

/// Point in the complex plane: the spatial address of a memory entry.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub re: f64,
    pub im: f64,
}

impl Coordinate {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// amplitude·(cos θ, sin θ)
    pub fn from_polar(amplitude: f64, theta: f64) -> Self {
        Self {
            re: amplitude * theta.cos(),
            im: amplitude * theta.sin(),
        }
    }

    pub fn magnitude(self) -> f64 {
        self.re.hypot(self.im)
    }

    /// Angle in [0, 2π). The origin maps to 0.
    pub fn angle(self) -> f64 {
        if self.magnitude() < EPSILON {
            return 0.0;
        }
        self.im.atan2(self.re).rem_euclid(std::f64::consts::TAU)
    }

    /// Euclidean distance.
    pub fn distance(self, other: Self) -> f64 {
        (self.re - other.re).hypot(self.im - other.im)
    }

    /// Mean of real and imaginary parts. Empty input yields the origin.
    pub fn centroid(points: &[Self]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let n = points.len() as f64;
        let (re, im) = points
            .iter()
            .fold((0.0, 0.0), |(re, im), p| (re + p.re, im + p.im));
        Self {
            re: re / n,
            im: im / n,
        }
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        (self.re - other.re).abs() < EPSILON && (self.im - other.im).abs() < EPSILON
    }
}

/// Spiral phase at a point in time: θ = φ·t + correction, normalized to [0, 2π).
///
/// `time_ms` is Unix milliseconds. The product is large, so the angle is
/// reduced modulo 2π before use to keep trig arguments small.
pub fn spiral_phase(time_ms: f64, phase_correction: f64) -> f64 {
    (PHI * time_ms + phase_correction).rem_euclid(std::f64::consts::TAU)
}

/// Shortest angular distance between two phases. Range: [0, π].
pub fn angular_gap(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(std::f64::consts::TAU);
    diff.min(std::f64::consts::TAU - diff)
}
