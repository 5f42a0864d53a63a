//! Rapier world owning one dynamic ball per particle.
//!
//! The bridge is the only code that touches the rapier sets. Particles are
//! addressed by their stable index; the bridge keeps the index → body table
//! so simulation state and physics state cannot drift apart.
//!
//! Per frame the clock calls `set_translation` for every particle, then
//! `step_world` once, then reads every `translation` back. Stepping only
//! after all overrides means contacts are solved against the complete
//! configuration of the frame.

use bevy::prelude::*;
use brownian_core::SpeciesPhysics;
use rapier3d::prelude as rapier;
use rapier::nalgebra::Vector3;

/// Errors reported by the physics bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The engine tick must be positive and finite.
    InvalidTimestep(f32),
    /// A body in a batch could not be created.
    InvalidBody { index: usize, reason: String },
    /// Batches are only spawned into an empty world.
    WorldNotEmpty(usize),
    /// No body is registered for this particle index.
    UnknownParticle(usize),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::InvalidTimestep(dt) => write!(f, "Invalid physics timestep: {}", dt),
            BridgeError::InvalidBody { index, reason } => {
                write!(f, "Cannot create body #{}: {}", index, reason)
            }
            BridgeError::WorldNotEmpty(n) => {
                write!(f, "Cannot spawn batch: world still holds {} bodies", n)
            }
            BridgeError::UnknownParticle(id) => write!(f, "No body for particle {}", id),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Opaque handle to a particle body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(rapier::RigidBodyHandle);

/// Everything needed to create one particle body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    pub position: Vec3,
    pub radius: f32,
    pub material: SpeciesPhysics,
}

fn to_vector(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

fn to_vec3(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Zero-gravity rapier world plus the particle → body table.
pub struct PhysicsBridge {
    gravity: Vector3<f32>,
    integration_parameters: rapier::IntegrationParameters,
    physics_pipeline: rapier::PhysicsPipeline,
    island_manager: rapier::IslandManager,
    broad_phase: rapier::DefaultBroadPhase,
    narrow_phase: rapier::NarrowPhase,
    rigid_body_set: rapier::RigidBodySet,
    collider_set: rapier::ColliderSet,
    impulse_joint_set: rapier::ImpulseJointSet,
    multibody_joint_set: rapier::MultibodyJointSet,
    ccd_solver: rapier::CCDSolver,
    /// Indexed by particle id.
    handles: Vec<BodyHandle>,
}

impl PhysicsBridge {
    /// Initialize an empty world ticking at `physics_timestep` seconds.
    pub fn new(physics_timestep: f32) -> Result<Self, BridgeError> {
        if !(physics_timestep.is_finite() && physics_timestep > 0.0) {
            return Err(BridgeError::InvalidTimestep(physics_timestep));
        }

        let mut integration_parameters = rapier::IntegrationParameters::default();
        integration_parameters.dt = physics_timestep;

        Ok(Self {
            gravity: Vector3::new(0.0, 0.0, 0.0),
            integration_parameters,
            physics_pipeline: rapier::PhysicsPipeline::new(),
            island_manager: rapier::IslandManager::new(),
            broad_phase: rapier::DefaultBroadPhase::new(),
            narrow_phase: rapier::NarrowPhase::new(),
            rigid_body_set: rapier::RigidBodySet::new(),
            collider_set: rapier::ColliderSet::new(),
            impulse_joint_set: rapier::ImpulseJointSet::new(),
            multibody_joint_set: rapier::MultibodyJointSet::new(),
            ccd_solver: rapier::CCDSolver::new(),
            handles: Vec::new(),
        })
    }

    /// Engine tick in seconds.
    pub fn timestep(&self) -> f32 {
        self.integration_parameters.dt
    }

    /// Change the engine tick (applied on reset).
    pub fn set_timestep(&mut self, physics_timestep: f32) -> Result<(), BridgeError> {
        if !(physics_timestep.is_finite() && physics_timestep > 0.0) {
            return Err(BridgeError::InvalidTimestep(physics_timestep));
        }
        self.integration_parameters.dt = physics_timestep;
        Ok(())
    }

    /// Create one dynamic body with a ball collider.
    ///
    /// The body is not registered to a particle index; `spawn_batch` does that.
    pub fn create_body(
        &mut self,
        position: Vec3,
        radius: f32,
        material: &SpeciesPhysics,
    ) -> Result<BodyHandle, BridgeError> {
        if !position.is_finite() {
            return Err(BridgeError::InvalidBody {
                index: self.handles.len(),
                reason: format!("non-finite position {:?}", position),
            });
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(BridgeError::InvalidBody {
                index: self.handles.len(),
                reason: format!("radius must be positive, got {}", radius),
            });
        }

        let body = rapier::RigidBodyBuilder::dynamic()
            .translation(to_vector(position))
            .linear_damping(material.linear_damping);
        let handle = self.rigid_body_set.insert(body);

        let collider = rapier::ColliderBuilder::ball(radius)
            .restitution(material.restitution)
            .friction(material.friction)
            .density(material.density);
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        Ok(BodyHandle(handle))
    }

    /// Remove a body and its collider. Returns false for stale handles.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                handle.0,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    /// Create the bodies for a whole batch, in particle order.
    ///
    /// Either every body is created and registered, or none is: on the first
    /// failure the bodies already created for this batch are removed again.
    pub fn spawn_batch(&mut self, specs: &[BodySpec]) -> Result<(), BridgeError> {
        if !self.handles.is_empty() {
            return Err(BridgeError::WorldNotEmpty(self.handles.len()));
        }

        let mut created = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            match self.create_body(spec.position, spec.radius, &spec.material) {
                Ok(handle) => created.push(handle),
                Err(err) => {
                    for handle in created {
                        self.remove_body(handle);
                    }
                    let reason = match err {
                        BridgeError::InvalidBody { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    return Err(BridgeError::InvalidBody { index, reason });
                }
            }
        }

        self.handles = created;
        Ok(())
    }

    /// Remove every particle body (reset only).
    pub fn clear(&mut self) {
        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            self.remove_body(handle);
        }
    }

    /// Handle registered for a particle index.
    pub fn handle(&self, id: usize) -> Option<BodyHandle> {
        self.handles.get(id).copied()
    }

    /// Whether a handle still refers to a live body.
    pub fn resolves(&self, handle: BodyHandle) -> bool {
        self.rigid_body_set.contains(handle.0)
    }

    /// Number of registered particle bodies.
    pub fn particle_count(&self) -> usize {
        self.handles.len()
    }

    /// Number of bodies in the rapier set.
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Override a particle's position before the collision step.
    pub fn set_translation(&mut self, id: usize, position: Vec3) -> Result<(), BridgeError> {
        let handle = self.handle(id).ok_or(BridgeError::UnknownParticle(id))?;
        let body = self
            .rigid_body_set
            .get_mut(handle.0)
            .ok_or(BridgeError::UnknownParticle(id))?;
        body.set_translation(to_vector(position), true);
        Ok(())
    }

    /// Collision-resolved position of a particle.
    pub fn translation(&self, id: usize) -> Option<Vec3> {
        let handle = self.handle(id)?;
        self.body_translation(handle)
    }

    /// Position of a body by handle, `None` once the body is gone.
    pub fn body_translation(&self, handle: BodyHandle) -> Option<Vec3> {
        self.rigid_body_set
            .get(handle.0)
            .map(|body| to_vec3(body.translation()))
    }

    /// Advance the contact solver by one tick.
    pub fn step_world(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }
}
