//! Random number sources for the particle simulation.
//!
//! Normal deviates are produced with the Box–Muller polar method: two
//! uniforms in (-1, 1) are rejected until they fall strictly inside the unit
//! circle (and not on the origin), then scaled by `sqrt(-2 ln s / s)`. No
//! trigonometric calls are needed and every accepted trial yields two
//! independent samples.
//!
//! The sampler itself holds no state. Callers pass the uniform generator in,
//! which keeps the sampler reentrant and lets tests feed scripted sequences.
//!
//! # Example
//!
//! ```ignore
//! use brownian_core::rng::{normal_pair, noise_vec3, SimRng};
//!
//! let mut rng = SimRng::from_seed(42);
//! let (z0, z1) = normal_pair(&mut rng, 0.0, 1.0);
//! let kick = noise_vec3(&mut rng, 0.02);
//! ```

use bevy::math::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform deviates consumed by the normal sampler.
pub trait UniformSource {
    /// Returns a uniform value in [-1.0, 1.0).
    fn next_signed_unit(&mut self) -> f64;
}

/// Seedable simulation RNG backed by `rand::rngs::StdRng`.
#[derive(Clone)]
pub struct SimRng {
    rng: StdRng,
}

impl SimRng {
    /// Create a reproducible generator from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when a seed is configured, entropy-seeded otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }

    /// Returns a uniform value in [-half_width, half_width).
    pub fn next_symmetric(&mut self, half_width: f32) -> f32 {
        if half_width <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-half_width..half_width)
    }
}

impl UniformSource for SimRng {
    fn next_signed_unit(&mut self) -> f64 {
        self.rng.gen_range(-1.0..1.0)
    }
}

/// Draw two independent normal deviates with the given mean and standard deviation.
///
/// Degenerate trials (`s >= 1` or `s == 0`) are redrawn internally. The
/// acceptance probability per trial is π/4, so the loop terminates almost
/// surely after a handful of draws.
pub fn normal_pair<S: UniformSource + ?Sized>(source: &mut S, mean: f64, sd: f64) -> (f64, f64) {
    let (u1, u2, s) = loop {
        let u1 = source.next_signed_unit();
        let u2 = source.next_signed_unit();
        let s = u1 * u1 + u2 * u2;
        if s < 1.0 && s != 0.0 {
            break (u1, u2, s);
        }
    };

    let factor = (-2.0 * s.ln() / s).sqrt();
    (mean + u1 * factor * sd, mean + u2 * factor * sd)
}

/// Draw an isotropic 3D Gaussian kick with per-axis standard deviation `sd`.
///
/// Two pairs are drawn; x and y come from the first pair, z from the first
/// component of the second. The unused fourth sample is discarded.
pub fn noise_vec3<S: UniformSource + ?Sized>(source: &mut S, sd: f32) -> Vec3 {
    let sd = sd as f64;
    let (x, y) = normal_pair(source, 0.0, sd);
    let (z, _) = normal_pair(source, 0.0, sd);
    Vec3::new(x as f32, y as f32, z as f32)
}
