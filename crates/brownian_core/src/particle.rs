//! Ordered per-particle state.
//!
//! The particle index is the only key shared with the physics engine: slot
//! `i` here and body `i` in the bridge describe the same particle for its
//! whole lifetime. Slots are never reordered or removed individually; the
//! whole store is rebuilt on reset.

use bevy::math::{Quat, Vec3};

/// One simulated particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Index into the owning `SimulationConfig::species`.
    pub species: usize,
    pub radius: f32,
    /// Mirrors the physics engine after each step.
    pub position: Vec3,
    /// Unit heading, `None` when propulsion is disabled.
    pub orientation: Option<Vec3>,
}

/// Ordered store of all particles for the current batch.
#[derive(Debug, Clone, Default)]
pub struct ParticleState {
    particles: Vec<Particle>,
}

impl ParticleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a freshly spawned batch.
    pub fn from_batch(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Particle> {
        self.particles.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    /// Overwrite the mirrored position of a particle.
    pub fn set_position(&mut self, id: usize, position: Vec3) {
        if let Some(p) = self.particles.get_mut(id) {
            p.position = position;
        }
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    /// Drop every particle (first half of a reset).
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Read-only copy handed to renderers.
    ///
    /// `batch` identifies the spawn the particles belong to; it changes on
    /// every reset so consumers can tell a new batch from a moved one.
    pub fn snapshot(&self, frame: u64, batch: u64) -> FrameSnapshot {
        FrameSnapshot {
            frame,
            batch,
            particles: self
                .particles
                .iter()
                .enumerate()
                .map(|(id, p)| ParticleView {
                    id,
                    species: p.species,
                    radius: p.radius,
                    position: p.position,
                    orientation: p.orientation,
                })
                .collect(),
        }
    }
}

/// Immutable view of one particle at a published frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleView {
    pub id: usize,
    pub species: usize,
    pub radius: f32,
    pub position: Vec3,
    pub orientation: Option<Vec3>,
}

impl ParticleView {
    /// Rotation that turns +Z onto the heading; identity without orientation.
    pub fn heading(&self) -> Quat {
        match self.orientation {
            Some(dir) if dir.length_squared() > 0.0 => {
                Quat::from_rotation_arc(Vec3::Z, dir.normalize())
            }
            _ => Quat::IDENTITY,
        }
    }

    /// Position after a uniform group scale and offset.
    pub fn placed_position(&self, scale: f32, offset: Vec3) -> Vec3 {
        self.position * scale + offset
    }
}

/// Particle state published at the end of a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSnapshot {
    pub frame: u64,
    /// Spawn generation, incremented by every reset.
    pub batch: u64,
    pub particles: Vec<ParticleView>,
}

impl FrameSnapshot {
    /// Magnitude of the mean heading: 0 for isotropic, 1 for fully aligned.
    pub fn polarization(&self) -> f32 {
        let mut sum = Vec3::ZERO;
        let mut n = 0usize;
        for dir in self.particles.iter().filter_map(|p| p.orientation) {
            sum += dir;
            n += 1;
        }
        if n == 0 {
            return 0.0;
        }
        (sum / n as f32).length()
    }
}
