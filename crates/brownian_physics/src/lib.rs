//! Collision engine bridge and frame scheduling for the Brownian simulation.
//!
//! This crate provides:
//! - `PhysicsBridge`: owns the rapier world, one dynamic ball per particle
//! - `SimulationClock`: Idle/Running lifecycle, per-frame update order, reset
//! - `SimulationPlugin`: bevy wiring with a control channel and AR placement
//! - `SimulationReportPlugin`: periodic log summary of the running batch

pub mod bridge;
pub mod clock;
pub mod plugin;
pub mod report;

pub use bridge::{BodyHandle, BodySpec, BridgeError, PhysicsBridge};
pub use clock::{ClockError, ClockState, ControlMessage, ControlSender, SimulationClock};
pub use plugin::{
    GroupPlacement, LatestSnapshot, SimulationControl, SimulationPlugin, SimulationSet,
};
pub use report::{
    SimulationReport, SimulationReportConfig, SimulationReportPlugin, SimulationStats,
};
