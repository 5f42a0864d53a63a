//! Initial placement of a particle batch.
//!
//! Positions are uniform over the domain (the cube for periodic and
//! unbounded runs, the ball for spherical ones). Headings are isotropic unit
//! vectors drawn by normalizing a Gaussian triple.

use bevy::math::Vec3;

use crate::boundary::BoundaryPolicy;
use crate::config::SimulationConfig;
use crate::particle::Particle;
use crate::rng::{noise_vec3, SimRng};

/// Isotropic random unit vector.
pub fn random_unit_vector(rng: &mut SimRng) -> Vec3 {
    loop {
        if let Some(dir) = noise_vec3(rng, 1.0).try_normalize() {
            return dir;
        }
    }
}

/// Uniform point in the cube `[-h, h)^3`.
pub fn random_in_cube(rng: &mut SimRng, half_width: f32) -> Vec3 {
    Vec3::new(
        rng.next_symmetric(half_width),
        rng.next_symmetric(half_width),
        rng.next_symmetric(half_width),
    )
}

/// Uniform point inside the ball of the given radius (rejection from the cube).
pub fn random_in_ball(rng: &mut SimRng, radius: f32) -> Vec3 {
    loop {
        let p = random_in_cube(rng, radius);
        if p.length_squared() <= radius * radius {
            return p;
        }
    }
}

/// Build the particles for every species, in species order.
///
/// The returned vector's index is the particle id.
pub fn spawn_particles(config: &SimulationConfig, rng: &mut SimRng) -> Vec<Particle> {
    let policy = BoundaryPolicy::from(config.boundary);
    let mut particles = Vec::with_capacity(config.total_particles());

    for (species_index, species) in config.species.iter().enumerate() {
        for _ in 0..species.count {
            let position = match policy {
                BoundaryPolicy::Unbounded => random_in_cube(rng, config.spawn_half_width),
                BoundaryPolicy::PeriodicCubic { half_width } => random_in_cube(rng, half_width),
                BoundaryPolicy::ClampingSphere { radius }
                | BoundaryPolicy::ReflectingSphere { radius } => random_in_ball(rng, radius),
            };
            let orientation = config.propulsion_enabled.then(|| random_unit_vector(rng));
            particles.push(Particle {
                species: species_index,
                radius: species.radius,
                position,
                orientation,
            });
        }
    }

    particles
}
