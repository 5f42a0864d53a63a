//! Core math for active Brownian particle simulation.
//!
//! This crate provides:
//! - Polar Box–Muller normal sampling over a seedable RNG
//! - Simulation configuration with Stokes–Einstein noise derivation
//! - Per-particle state and read-only frame snapshots
//! - Rotational diffusion of self-propulsion headings
//! - Translational integration (propulsion + thermal noise)
//! - Boundary policies (periodic box, clamping sphere, reflecting sphere)
//! - Batch spawning of initial positions and headings
//!
//! Nothing here touches the ECS or the collision engine; see
//! `brownian_physics` for the rapier bridge and the frame clock.

pub mod boundary;
pub mod config;
pub mod motion;
pub mod orientation;
pub mod particle;
pub mod rng;
pub mod spawn;

pub use boundary::{reflect, wrap_coordinate, BoundaryPolicy};
pub use config::{
    BoundaryKind, ConfigError, SimulationConfig, Species, SpeciesPhysics, ThermalParams,
};
pub use motion::MotionIntegrator;
pub use orientation::OrientationDiffuser;
pub use particle::{FrameSnapshot, Particle, ParticleState, ParticleView};
pub use rng::{noise_vec3, normal_pair, SimRng, UniformSource};
pub use spawn::{random_in_ball, random_in_cube, random_unit_vector, spawn_particles};
