//! Bevy integration for the simulation clock.
//!
//! Renderers read [`LatestSnapshot`], AR placement writes [`GroupPlacement`],
//! and UI code sends parameter changes through [`SimulationControl`]. None of
//! them touch particle state directly.

use bevy::prelude::*;
use brownian_core::{FrameSnapshot, ParticleView, SimulationConfig};

use crate::clock::{ClockState, ControlSender, SimulationClock};

/// Plugin that starts the simulation and advances it once per `Update`.
#[derive(Default)]
pub struct SimulationPlugin {
    pub config: SimulationConfig,
}

impl SimulationPlugin {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let clock = SimulationClock::new(self.config.clone());
        let control = SimulationControl(clock.control());

        app.insert_resource(clock)
            .insert_resource(control)
            .init_resource::<LatestSnapshot>()
            .init_resource::<GroupPlacement>()
            .add_systems(Startup, start_simulation)
            .add_systems(Update, advance_simulation.in_set(SimulationSet::Advance));
    }
}

/// Ordering label for systems that consume the published snapshot.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    Advance,
}

/// Snapshot published by the last advanced frame.
#[derive(Resource, Default, Debug, Clone)]
pub struct LatestSnapshot(pub FrameSnapshot);

/// Queue for live parameter changes and resets.
#[derive(Resource, Clone)]
pub struct SimulationControl(pub ControlSender);

/// Coarse placement of the whole particle group in the viewer's space.
///
/// Only affects how positions are presented; the simulation never reads
/// scale or offset.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct GroupPlacement {
    pub visible: bool,
    /// Freezes the frame sequence without tearing anything down.
    pub paused: bool,
    pub scale: f32,
    pub offset: Vec3,
}

impl Default for GroupPlacement {
    fn default() -> Self {
        Self {
            visible: true,
            paused: false,
            scale: 1.0,
            offset: Vec3::ZERO,
        }
    }
}

impl GroupPlacement {
    /// Tabletop placement at an anchor: 1/20 scale, lifted 0.8 above the hit point.
    pub fn ar_anchor(anchor: Vec3) -> Self {
        Self {
            visible: true,
            paused: false,
            scale: 0.05,
            offset: anchor + Vec3::new(0.0, 0.8, 0.0),
        }
    }

    /// World-space position of a particle under this placement.
    pub fn place(&self, view: &ParticleView) -> Vec3 {
        view.placed_position(self.scale, self.offset)
    }
}

fn start_simulation(mut clock: ResMut<SimulationClock>) {
    // Failures are logged by the clock; it stays idle.
    let _ = clock.start_default_engine();
}

fn advance_simulation(
    mut clock: ResMut<SimulationClock>,
    placement: Res<GroupPlacement>,
    mut latest: ResMut<LatestSnapshot>,
) {
    if placement.paused || clock.state() != ClockState::Running {
        return;
    }

    match clock.advance() {
        Ok(snapshot) => latest.0 = snapshot,
        Err(e) => error!("Simulation frame {} failed: {}", clock.frame() + 1, e),
    }
}
