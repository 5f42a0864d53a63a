//! Frame clock driving the simulation.
//!
//! The clock starts `Idle` and enters `Running` once the physics engine has
//! been handed over successfully. Every running frame performs, in order:
//!
//! 0. apply queued control messages (parameter changes, reset)
//! 1. diffuse headings (propulsion only)
//! 2. integrate and boundary-constrain a candidate for every particle
//! 3. push all candidates into the physics bridge
//! 4. step the physics world once
//! 5. read the collision-resolved positions back
//! 6. publish a snapshot
//!
//! Particle index `i` is used for the same particle in every pass.

use bevy::prelude::*;
use brownian_core::{
    spawn_particles, BoundaryPolicy, ConfigError, FrameSnapshot, MotionIntegrator,
    OrientationDiffuser, ParticleState, SimRng, SimulationConfig,
};

use crate::bridge::{BodySpec, BridgeError, PhysicsBridge};

/// Errors surfaced by the clock.
#[derive(Debug)]
pub enum ClockError {
    Config(ConfigError),
    Bridge(BridgeError),
    /// Frames can only advance once the engine is running.
    NotRunning,
    AlreadyRunning,
}

impl std::fmt::Display for ClockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockError::Config(e) => write!(f, "Configuration error: {}", e),
            ClockError::Bridge(e) => write!(f, "Physics error: {}", e),
            ClockError::NotRunning => write!(f, "Simulation is not running"),
            ClockError::AlreadyRunning => write!(f, "Simulation is already running"),
        }
    }
}

impl std::error::Error for ClockError {}

impl From<ConfigError> for ClockError {
    fn from(e: ConfigError) -> Self {
        ClockError::Config(e)
    }
}

impl From<BridgeError> for ClockError {
    fn from(e: BridgeError) -> Self {
        ClockError::Bridge(e)
    }
}

/// Lifecycle of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    /// Waiting for the physics engine.
    #[default]
    Idle,
    /// Advancing one step per frame.
    Running,
}

/// Changes requested from outside the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    SetPropulsionSpeed(f32),
    SetRotationalDiffusion(f32),
    SetNoiseScale(f32),
    /// Rebuild all particles; `None` keeps the current configuration.
    Reset(Option<SimulationConfig>),
}

/// Cloneable handle for queuing control messages.
///
/// Messages are applied at the start of the next frame, never mid-frame.
#[derive(Debug, Clone)]
pub struct ControlSender(async_channel::Sender<ControlMessage>);

impl ControlSender {
    /// Queue a message. Returns false if the clock is gone.
    pub fn send(&self, message: ControlMessage) -> bool {
        self.0.try_send(message).is_ok()
    }

    pub fn set_propulsion_speed(&self, speed: f32) -> bool {
        self.send(ControlMessage::SetPropulsionSpeed(speed))
    }

    pub fn set_rotational_diffusion(&self, d_r: f32) -> bool {
        self.send(ControlMessage::SetRotationalDiffusion(d_r))
    }

    pub fn set_noise_scale(&self, scale: f32) -> bool {
        self.send(ControlMessage::SetNoiseScale(scale))
    }

    pub fn request_reset(&self, config: Option<SimulationConfig>) -> bool {
        self.send(ControlMessage::Reset(config))
    }
}

fn check_live(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value: value as f64,
        })
    }
}

/// Owns the particle state, the physics bridge and the frame sequence.
#[derive(Resource)]
pub struct SimulationClock {
    state: ClockState,
    config: SimulationConfig,
    particles: ParticleState,
    bridge: Option<PhysicsBridge>,
    rng: SimRng,
    frame: u64,
    batch: u64,
    control_tx: async_channel::Sender<ControlMessage>,
    control_rx: async_channel::Receiver<ControlMessage>,
}

impl SimulationClock {
    /// Create an idle clock. The configuration is validated on `start`.
    pub fn new(config: SimulationConfig) -> Self {
        let (control_tx, control_rx) = async_channel::unbounded();
        let rng = SimRng::from_optional_seed(config.seed);
        Self {
            state: ClockState::Idle,
            config,
            particles: ParticleState::new(),
            bridge: None,
            rng,
            frame: 0,
            batch: 0,
            control_tx,
            control_rx,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn particles(&self) -> &ParticleState {
        &self.particles
    }

    pub fn bridge(&self) -> Option<&PhysicsBridge> {
        self.bridge.as_ref()
    }

    /// Number of frames advanced since start.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Generation of the current particle batch; 0 before the first spawn.
    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// Handle for queuing parameter changes and resets.
    pub fn control(&self) -> ControlSender {
        ControlSender(self.control_tx.clone())
    }

    /// Hand over the initialized physics engine and build the first batch.
    ///
    /// Any failure is logged once and leaves the clock `Idle`.
    pub fn start(&mut self, engine: Result<PhysicsBridge, BridgeError>) -> Result<(), ClockError> {
        if self.state == ClockState::Running {
            return Err(ClockError::AlreadyRunning);
        }

        match self.try_start(engine) {
            Ok(()) => {
                self.state = ClockState::Running;
                info!(
                    "Simulation running: {} particles, boundary {:?}, dt {}s, physics tick {}s",
                    self.particles.len(),
                    self.config.boundary,
                    self.config.timestep,
                    self.config.physics_timestep
                );
                Ok(())
            }
            Err(e) => {
                self.bridge = None;
                self.particles.clear();
                error!("Failed to start simulation: {}", e);
                Err(e)
            }
        }
    }

    fn try_start(&mut self, engine: Result<PhysicsBridge, BridgeError>) -> Result<(), ClockError> {
        let bridge = engine?;
        self.config.validate()?;
        self.bridge = Some(bridge);
        self.populate()
    }

    /// Initialize a rapier world from the configured tick and start.
    pub fn start_default_engine(&mut self) -> Result<(), ClockError> {
        let engine = PhysicsBridge::new(self.config.physics_timestep);
        self.start(engine)
    }

    /// Spawn particles and bodies for the current configuration.
    fn populate(&mut self) -> Result<(), ClockError> {
        let Some(bridge) = self.bridge.as_mut() else {
            return Err(ClockError::NotRunning);
        };

        let particles = spawn_particles(&self.config, &mut self.rng);
        let specs: Vec<BodySpec> = particles
            .iter()
            .map(|p| BodySpec {
                position: p.position,
                radius: p.radius,
                material: self.config.species[p.species].physics,
            })
            .collect();

        bridge.spawn_batch(&specs)?;
        self.particles = ParticleState::from_batch(particles);
        self.batch += 1;
        debug!(
            "Spawned batch {} of {} particles",
            self.batch,
            self.particles.len()
        );
        Ok(())
    }

    /// Destroy every particle and body, then rebuild from `config`.
    ///
    /// `None` rebuilds with the current configuration, including parameter
    /// changes applied since start. An invalid configuration is rejected
    /// before anything is destroyed. When batch creation fails the particle
    /// set is left empty.
    pub fn reset(&mut self, config: Option<SimulationConfig>) -> Result<(), ClockError> {
        let config = config.unwrap_or_else(|| self.config.clone());
        config.validate()?;

        // A seeded reset replays the same stream as a fresh start.
        if let Some(seed) = config.seed {
            self.rng = SimRng::from_seed(seed);
        }
        self.config = config;

        let Some(bridge) = self.bridge.as_mut() else {
            // Idle: the new configuration is used by `start`.
            return Ok(());
        };

        bridge.clear();
        self.particles.clear();
        bridge.set_timestep(self.config.physics_timestep)?;

        match self.populate() {
            Ok(()) => {
                info!("Simulation reset with {} particles", self.particles.len());
                Ok(())
            }
            Err(e) => {
                error!("Simulation reset failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn set_propulsion_speed(&mut self, speed: f32) -> Result<(), ClockError> {
        check_live("propulsion_speed", speed)?;
        self.config.propulsion_speed = speed;
        Ok(())
    }

    pub fn set_rotational_diffusion(&mut self, d_r: f32) -> Result<(), ClockError> {
        check_live("rotational_diffusion", d_r)?;
        self.config.rotational_diffusion = d_r;
        Ok(())
    }

    pub fn set_noise_scale(&mut self, scale: f32) -> Result<(), ClockError> {
        check_live("noise_scale", scale)?;
        self.config.noise_scale = scale;
        Ok(())
    }

    /// Drain the control channel. Rejected messages are logged and dropped.
    fn apply_controls(&mut self) {
        while let Ok(message) = self.control_rx.try_recv() {
            let result = match message {
                ControlMessage::SetPropulsionSpeed(v) => self.set_propulsion_speed(v),
                ControlMessage::SetRotationalDiffusion(v) => self.set_rotational_diffusion(v),
                ControlMessage::SetNoiseScale(v) => self.set_noise_scale(v),
                ControlMessage::Reset(config) => self.reset(config),
            };
            if let Err(e) = result {
                warn!("Ignoring control message: {}", e);
            }
        }
    }

    /// Run one frame and return the published snapshot.
    pub fn advance(&mut self) -> Result<FrameSnapshot, ClockError> {
        if self.state != ClockState::Running {
            return Err(ClockError::NotRunning);
        }
        self.apply_controls();

        let Some(bridge) = self.bridge.as_mut() else {
            return Err(ClockError::NotRunning);
        };

        let dt = self.config.timestep;
        if self.config.propulsion_enabled {
            OrientationDiffuser::new(self.config.rotational_diffusion).diffuse_all(
                &mut self.particles,
                dt,
                &mut self.rng,
            );
        }

        let integrator = MotionIntegrator::from_config(&self.config);
        let policy = BoundaryPolicy::from(self.config.boundary);
        let mut candidates = Vec::with_capacity(self.particles.len());
        for particle in self.particles.iter_mut() {
            let candidate = integrator.candidate(
                particle.position,
                particle.orientation,
                particle.species,
                &mut self.rng,
            );
            candidates.push(policy.apply(candidate, &mut particle.orientation));
        }

        for (id, candidate) in candidates.into_iter().enumerate() {
            bridge.set_translation(id, candidate)?;
        }

        bridge.step_world();

        for id in 0..self.particles.len() {
            let resolved = bridge
                .translation(id)
                .ok_or(BridgeError::UnknownParticle(id))?;
            self.particles.set_position(id, resolved);
        }

        self.frame += 1;
        Ok(self.particles.snapshot(self.frame, self.batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brownian_core::{BoundaryKind, Species};
    use std::collections::HashSet;

    fn small_config(count: usize) -> SimulationConfig {
        SimulationConfig {
            species: vec![Species::new("swimmer", 0.3, count, 0xff0000)],
            seed: Some(42),
            ..Default::default()
        }
    }

    fn running(config: SimulationConfig) -> SimulationClock {
        let mut clock = SimulationClock::new(config);
        clock.start_default_engine().expect("clock should start");
        clock
    }

    #[test]
    fn test_starts_idle_and_runs_after_start() {
        let mut clock = SimulationClock::new(small_config(10));
        assert_eq!(clock.state(), ClockState::Idle);
        assert!(matches!(clock.advance(), Err(ClockError::NotRunning)));

        clock.start_default_engine().unwrap();
        assert_eq!(clock.state(), ClockState::Running);
        assert_eq!(clock.particles().len(), 10);
        assert_eq!(clock.bridge().unwrap().body_count(), 10);

        let snapshot = clock.advance().unwrap();
        assert_eq!(snapshot.frame, 1);
        assert_eq!(snapshot.particles.len(), 10);
        assert!(matches!(clock.start_default_engine(), Err(ClockError::AlreadyRunning)));
    }

    #[test]
    fn test_engine_failure_keeps_clock_idle() {
        let mut clock = SimulationClock::new(small_config(10));
        let result = clock.start(Err(BridgeError::InvalidTimestep(0.0)));

        assert!(matches!(result, Err(ClockError::Bridge(_))));
        assert_eq!(clock.state(), ClockState::Idle);
        assert!(clock.bridge().is_none());
        assert!(matches!(clock.advance(), Err(ClockError::NotRunning)));

        // A later successful hand-over still works.
        clock.start_default_engine().unwrap();
        assert_eq!(clock.state(), ClockState::Running);
    }

    #[test]
    fn test_invalid_config_keeps_clock_idle() {
        let config = SimulationConfig {
            propulsion_enabled: false,
            boundary: BoundaryKind::ReflectingSphere { radius: 5.0 },
            ..small_config(5)
        };
        let mut clock = SimulationClock::new(config);
        let result = clock.start_default_engine();
        assert!(matches!(
            result,
            Err(ClockError::Config(ConfigError::ReflectingWithoutPropulsion))
        ));
        assert_eq!(clock.state(), ClockState::Idle);
        assert!(clock.particles().is_empty());
    }

    #[test]
    fn test_reset_rebuilds_batch_with_fresh_handles() {
        let mut clock = running(small_config(20));
        for _ in 0..5 {
            clock.advance().unwrap();
        }
        let old_handles: Vec<_> = (0..20)
            .map(|id| clock.bridge().unwrap().handle(id).unwrap())
            .collect();

        clock.reset(Some(small_config(37))).unwrap();

        let bridge = clock.bridge().unwrap();
        assert_eq!(clock.particles().len(), 37);
        assert_eq!(bridge.particle_count(), 37);
        assert_eq!(bridge.body_count(), 37);

        let new_handles: HashSet<_> = (0..37).map(|id| bridge.handle(id).unwrap()).collect();
        assert_eq!(new_handles.len(), 37, "handles must be distinct");
        assert!(new_handles.iter().all(|h| bridge.resolves(*h)));
        for handle in old_handles {
            assert!(!bridge.resolves(handle), "stale handle still resolves");
        }
    }

    #[test]
    fn test_invalid_reset_keeps_running_set() {
        let mut clock = running(small_config(12));
        let bad = SimulationConfig {
            timestep: -1.0,
            ..small_config(3)
        };
        assert!(clock.reset(Some(bad)).is_err());
        assert_eq!(clock.particles().len(), 12);
        assert_eq!(clock.bridge().unwrap().body_count(), 12);
        assert_eq!(clock.config().timestep, 0.0001);
    }

    #[test]
    fn test_reset_without_config_keeps_live_parameters() {
        let mut clock = running(small_config(8));
        clock.set_propulsion_speed(12.0).unwrap();
        clock.reset(None).unwrap();
        assert_eq!(clock.config().propulsion_speed, 12.0);
        assert_eq!(clock.particles().len(), 8);
    }

    #[test]
    fn test_controls_apply_on_next_frame() {
        let mut clock = running(small_config(5));
        let control = clock.control();

        assert!(control.set_propulsion_speed(7.5));
        assert!(control.set_rotational_diffusion(2.0));
        assert!(control.set_noise_scale(0.5));
        // Queued, not yet applied.
        assert_eq!(clock.config().propulsion_speed, 100.0);

        clock.advance().unwrap();
        assert_eq!(clock.config().propulsion_speed, 7.5);
        assert_eq!(clock.config().rotational_diffusion, 2.0);
        assert_eq!(clock.config().noise_scale, 0.5);
    }

    #[test]
    fn test_invalid_controls_are_ignored() {
        let mut clock = running(small_config(5));
        let control = clock.control();
        control.set_propulsion_speed(-3.0);
        control.set_noise_scale(f32::NAN);
        clock.advance().unwrap();
        assert_eq!(clock.config().propulsion_speed, 100.0);
        assert_eq!(clock.config().noise_scale, 1.0);
    }

    #[test]
    fn test_reset_message_rebuilds_between_frames() {
        let mut clock = running(small_config(5));
        clock.control().request_reset(Some(small_config(9)));
        let snapshot = clock.advance().unwrap();
        assert_eq!(snapshot.particles.len(), 9);
        assert_eq!(clock.bridge().unwrap().body_count(), 9);
    }

    #[test]
    fn test_particle_count_constant_between_resets() {
        let mut clock = running(small_config(30));
        for _ in 0..50 {
            let snapshot = clock.advance().unwrap();
            assert_eq!(snapshot.particles.len(), 30);
            assert_eq!(clock.bridge().unwrap().body_count(), 30);
        }
    }

    #[test]
    fn test_orientations_stay_unit_for_every_boundary() {
        let boundaries = [
            BoundaryKind::Unbounded,
            BoundaryKind::PeriodicCubic { half_width: 3.0 },
            BoundaryKind::ClampingSphere { radius: 3.0 },
            BoundaryKind::ReflectingSphere { radius: 3.0 },
        ];
        for boundary in boundaries {
            let config = SimulationConfig {
                boundary,
                rotational_diffusion: 20.0,
                timestep: 0.01,
                ..small_config(40)
            };
            let mut clock = running(config);
            for _ in 0..100 {
                let snapshot = clock.advance().unwrap();
                for view in &snapshot.particles {
                    let len = view.orientation.unwrap().length();
                    assert!(
                        (len - 1.0).abs() <= 1e-6,
                        "{:?}: heading length {}",
                        boundary,
                        len
                    );
                }
            }
        }
    }

    #[test]
    fn test_passive_particles_have_no_orientation() {
        let config = SimulationConfig {
            propulsion_enabled: false,
            ..small_config(10)
        };
        let mut clock = running(config);
        let snapshot = clock.advance().unwrap();
        assert!(snapshot.particles.iter().all(|p| p.orientation.is_none()));
    }

    #[test]
    fn test_propulsion_moves_particles_along_heading() {
        let config = SimulationConfig {
            boundary: BoundaryKind::Unbounded,
            spawn_half_width: 100.0,
            noise_scale: 0.0,
            rotational_diffusion: 0.0,
            propulsion_speed: 100.0,
            timestep: 0.001,
            ..small_config(3)
        };
        let mut clock = running(config);
        let before = clock.particles().clone();
        clock.advance().unwrap();

        for (old, new) in before.iter().zip(clock.particles().iter()) {
            let expected = old.position + old.orientation.unwrap() * 0.1;
            assert!(
                (new.position - expected).length() < 1e-3,
                "expected {:?}, got {:?}",
                expected,
                new.position
            );
        }
    }

    #[test]
    fn test_mean_squared_displacement_matches_diffusion() {
        let config = SimulationConfig {
            species: vec![Species::new("colloid", 0.3, 400, 0xffffff)],
            propulsion_enabled: false,
            propulsion_speed: 0.0,
            rotational_diffusion: 0.0,
            boundary: BoundaryKind::Unbounded,
            spawn_half_width: 200.0,
            seed: Some(2024),
            ..Default::default()
        };
        let d = config.thermal.diffusion_coefficient(0.3);
        let steps = 500;
        let elapsed = steps as f64 * config.timestep as f64;

        let mut clock = running(config);
        let start = clock.particles().positions();
        for _ in 0..steps {
            clock.advance().unwrap();
        }
        let end = clock.particles().positions();

        let msd: f64 = start
            .iter()
            .zip(end.iter())
            .map(|(a, b)| a.distance_squared(*b) as f64)
            .sum::<f64>()
            / start.len() as f64;
        let expected = 6.0 * d * elapsed;
        println!("MSD = {:.4}, expected 6DT = {:.4} (D = {:.4})", msd, expected, d);
        assert!(
            (msd - expected).abs() / expected < 0.15,
            "MSD {} should be near {}",
            msd,
            expected
        );
    }

    #[test]
    fn test_reset_starts_new_batch() {
        let mut clock = running(small_config(10));
        let first = clock.advance().unwrap();
        assert_eq!(first.batch, 1);

        clock.reset(None).unwrap();
        let second = clock.advance().unwrap();
        assert_eq!(second.batch, 2, "reset must bump the batch");
        assert_eq!(second.frame, first.frame + 1, "frame counter keeps counting");
    }

    #[test]
    fn test_seeded_reset_replays_initial_batch() {
        let config = small_config(12);
        let mut clock = running(config.clone());
        let initial: Vec<_> = clock.particles().iter().cloned().collect();
        for _ in 0..5 {
            clock.advance().unwrap();
        }

        clock.reset(Some(config)).unwrap();
        let replayed: Vec<_> = clock.particles().iter().cloned().collect();
        assert_eq!(replayed, initial, "same seed must respawn the same batch");
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mut a = running(small_config(15));
        let mut b = running(small_config(15));
        for _ in 0..10 {
            assert_eq!(a.advance().unwrap(), b.advance().unwrap());
        }
    }
}
