//! Overdamped Langevin position update for active Brownian particles.
//!
//! `candidate = position + v0 · u · dt + ξ`, where `u` is the heading (when
//! propulsion is on) and `ξ` is a Gaussian kick whose per-axis standard
//! deviation comes from the Stokes–Einstein relation for the particle's
//! species (see `ThermalParams::translational_sd`).

use bevy::math::Vec3;

use crate::config::SimulationConfig;
use crate::rng::{noise_vec3, UniformSource};

/// Parameters of one integration step, read once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionIntegrator {
    pub propulsion_enabled: bool,
    pub propulsion_speed: f32,
    pub timestep: f32,
    /// Translational sd per species, noise scale already applied.
    pub species_sd: Vec<f32>,
}

impl MotionIntegrator {
    /// Snapshot the motion parameters of a configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            propulsion_enabled: config.propulsion_enabled,
            propulsion_speed: config.propulsion_speed,
            timestep: config.timestep,
            species_sd: config
                .species
                .iter()
                .map(|s| config.translational_sd(s))
                .collect(),
        }
    }

    /// Translational sd of a species, zero for unknown indices.
    pub fn sd_for(&self, species: usize) -> f32 {
        self.species_sd.get(species).copied().unwrap_or(0.0)
    }

    /// Deterministic drift over one step.
    pub fn drift(&self, orientation: Option<Vec3>) -> Vec3 {
        match orientation {
            Some(u) if self.propulsion_enabled => u * (self.propulsion_speed * self.timestep),
            _ => Vec3::ZERO,
        }
    }

    /// Candidate position before boundary handling and collisions.
    pub fn candidate<S: UniformSource + ?Sized>(
        &self,
        position: Vec3,
        orientation: Option<Vec3>,
        species: usize,
        rng: &mut S,
    ) -> Vec3 {
        position + self.drift(orientation) + noise_vec3(rng, self.sd_for(species))
    }
}
