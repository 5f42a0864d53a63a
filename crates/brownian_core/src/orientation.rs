//! Rotational diffusion of self-propulsion headings.
//!
//! Each step adds an isotropic Gaussian kick of per-axis standard deviation
//! `sqrt(2 D_r dt)` to the heading and projects the result back onto the
//! unit sphere. For small kicks this is the standard Euler–Maruyama scheme
//! for a random walk on S².

use bevy::math::Vec3;

use crate::particle::ParticleState;
use crate::rng::{noise_vec3, UniformSource};

/// Random walk of unit headings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationDiffuser {
    /// Rotational diffusion coefficient `D_r`.
    pub rotational_diffusion: f32,
}

impl OrientationDiffuser {
    pub fn new(rotational_diffusion: f32) -> Self {
        Self {
            rotational_diffusion,
        }
    }

    /// Per-axis noise amplitude for a step of length `dt`.
    pub fn noise_scale(&self, dt: f32) -> f32 {
        (2.0 * self.rotational_diffusion * dt).sqrt()
    }

    /// Apply one kick to a single heading.
    ///
    /// A zero-length or non-finite sum keeps the previous heading.
    pub fn diffuse<S: UniformSource + ?Sized>(
        &self,
        orientation: Vec3,
        dt: f32,
        rng: &mut S,
    ) -> Vec3 {
        let scale = self.noise_scale(dt);
        if scale == 0.0 {
            return orientation;
        }
        let kicked = orientation + noise_vec3(rng, scale);
        kicked.try_normalize().unwrap_or(orientation)
    }

    /// Diffuse every defined heading in index order.
    pub fn diffuse_all<S: UniformSource + ?Sized>(
        &self,
        particles: &mut ParticleState,
        dt: f32,
        rng: &mut S,
    ) {
        for particle in particles.iter_mut() {
            if let Some(orientation) = particle.orientation {
                particle.orientation = Some(self.diffuse(orientation, dt, rng));
            }
        }
    }
}
