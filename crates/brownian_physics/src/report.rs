//! Periodic log summary of a running simulation.
//!
//! ## Usage
//!
//! ```ignore
//! use brownian_physics::{SimulationPlugin, SimulationReportPlugin, SimulationReportConfig};
//!
//! App::new()
//!     .add_plugins(SimulationPlugin::default())
//!     .add_plugins(SimulationReportPlugin)
//!     .insert_resource(SimulationReportConfig {
//!         report_interval_secs: 5.0,
//!         enabled: true,
//!     })
//!     .run();
//! ```
//!
//! Output (every N seconds):
//! ```text
//! Frames: 300 | Particles: 1504 | RMS step: 0.0381 | Polarization: 0.021
//! ```

use bevy::prelude::*;
use brownian_core::{BoundaryKind, FrameSnapshot};

use crate::clock::SimulationClock;
use crate::plugin::{LatestSnapshot, SimulationSet};

/// Configuration for simulation reporting.
#[derive(Resource)]
pub struct SimulationReportConfig {
    /// How often to report (in seconds)
    pub report_interval_secs: f32,
    /// Whether reporting is enabled
    pub enabled: bool,
}

impl Default for SimulationReportConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 2.0,
            enabled: true,
        }
    }
}

/// Samples collected between two reports.
#[derive(Resource, Default)]
pub struct SimulationStats {
    time_since_report: f32,
    frames: u64,
    particle_count: usize,
    last_frame: Option<u64>,
    last_batch: Option<u64>,
    last_positions: Vec<Vec3>,
    step_sq_sum: f64,
    step_samples: u64,
    polarization_values: Vec<f32>,
}

/// Minimum-image displacement for a periodic box of side `period`.
fn unwrap_displacement(delta: Vec3, period: Option<f32>) -> Vec3 {
    match period {
        Some(p) => delta - p * (delta / p).round(),
        None => delta,
    }
}

impl SimulationStats {
    /// Fold a newly published snapshot into the running statistics.
    ///
    /// Displacements are only measured between consecutive frames of the
    /// same batch; a reset or a skipped frame starts a new baseline.
    pub fn record(&mut self, snapshot: &FrameSnapshot, period: Option<f32>) {
        if self.last_frame == Some(snapshot.frame) {
            return;
        }

        let consecutive = self.last_frame.map(|f| f + 1) == Some(snapshot.frame)
            && self.last_batch == Some(snapshot.batch)
            && self.last_positions.len() == snapshot.particles.len();
        if consecutive {
            for (old, view) in self.last_positions.iter().zip(&snapshot.particles) {
                let step = unwrap_displacement(view.position - *old, period);
                self.step_sq_sum += step.length_squared() as f64;
                self.step_samples += 1;
            }
        }

        self.last_positions.clear();
        self.last_positions
            .extend(snapshot.particles.iter().map(|p| p.position));
        self.last_frame = Some(snapshot.frame);
        self.last_batch = Some(snapshot.batch);
        self.particle_count = snapshot.particles.len();
        self.frames += 1;
        self.polarization_values.push(snapshot.polarization());
    }

    /// Calculate statistics from collected samples.
    pub fn calculate(&self) -> SimulationReport {
        let rms_step = if self.step_samples > 0 {
            (self.step_sq_sum / self.step_samples as f64).sqrt()
        } else {
            0.0
        };
        let mean_polarization = if self.polarization_values.is_empty() {
            0.0
        } else {
            self.polarization_values.iter().sum::<f32>() / self.polarization_values.len() as f32
        };

        SimulationReport {
            frames: self.frames,
            particle_count: self.particle_count,
            rms_step,
            mean_polarization,
        }
    }

    /// Clear collected samples, keeping the displacement baseline.
    pub fn clear(&mut self) {
        self.frames = 0;
        self.step_sq_sum = 0.0;
        self.step_samples = 0;
        self.polarization_values.clear();
        self.time_since_report = 0.0;
    }
}

/// Result of a report interval.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub frames: u64,
    pub particle_count: usize,
    /// Root-mean-square displacement per frame, wrap-corrected.
    pub rms_step: f64,
    pub mean_polarization: f32,
}

impl std::fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frames: {} | Particles: {} | RMS step: {:.4} | Polarization: {:.3}",
            self.frames, self.particle_count, self.rms_step, self.mean_polarization
        )
    }
}

fn collect_simulation_stats(
    config: Res<SimulationReportConfig>,
    clock: Res<SimulationClock>,
    latest: Res<LatestSnapshot>,
    mut stats: ResMut<SimulationStats>,
) {
    if !config.enabled || !latest.is_changed() {
        return;
    }

    let period = match clock.config().boundary {
        BoundaryKind::PeriodicCubic { half_width } => Some(2.0 * half_width),
        _ => None,
    };
    stats.record(&latest.0, period);
}

fn report_simulation(
    config: Res<SimulationReportConfig>,
    mut stats: ResMut<SimulationStats>,
    time: Res<Time>,
) {
    if !config.enabled {
        return;
    }

    stats.time_since_report += time.delta_secs();

    if stats.time_since_report >= config.report_interval_secs {
        let result = stats.calculate();
        if result.frames > 0 {
            info!("{}", result);
        }
        stats.clear();
    }
}

/// Plugin that logs a simulation summary at a fixed interval.
///
/// Requires `SimulationPlugin`.
pub struct SimulationReportPlugin;

impl Plugin for SimulationReportPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationReportConfig>()
            .init_resource::<SimulationStats>()
            .add_systems(
                Update,
                (collect_simulation_stats, report_simulation)
                    .chain()
                    .after(SimulationSet::Advance),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brownian_core::ParticleView;

    fn snapshot(frame: u64, xs: &[f32], orientation: Option<Vec3>) -> FrameSnapshot {
        batch_snapshot(1, frame, xs, orientation)
    }

    fn batch_snapshot(
        batch: u64,
        frame: u64,
        xs: &[f32],
        orientation: Option<Vec3>,
    ) -> FrameSnapshot {
        FrameSnapshot {
            frame,
            batch,
            particles: xs
                .iter()
                .enumerate()
                .map(|(id, x)| ParticleView {
                    id,
                    species: 0,
                    radius: 0.3,
                    position: Vec3::new(*x, 0.0, 0.0),
                    orientation,
                })
                .collect(),
        }
    }

    #[test]
    fn test_report_config_default() {
        let config = SimulationReportConfig::default();
        assert!((config.report_interval_secs - 2.0).abs() < 0.001);
        assert!(config.enabled);
    }

    #[test]
    fn test_stats_empty() {
        let stats = SimulationStats::default();
        let result = stats.calculate();
        assert_eq!(result.frames, 0);
        assert_eq!(result.rms_step, 0.0);
    }

    #[test]
    fn test_stats_rms_step() {
        let mut stats = SimulationStats::default();
        stats.record(&snapshot(1, &[0.0, 0.0], Some(Vec3::X)), None);
        stats.record(&snapshot(2, &[3.0, 4.0], Some(Vec3::X)), None);

        let result = stats.calculate();
        assert_eq!(result.frames, 2);
        assert_eq!(result.particle_count, 2);
        // sqrt((9 + 16) / 2)
        assert!((result.rms_step - 12.5f64.sqrt()).abs() < 1e-6);
        assert!((result.mean_polarization - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stats_unwrap_periodic_jumps() {
        let mut stats = SimulationStats::default();
        stats.record(&snapshot(1, &[6.9], None), Some(14.0));
        stats.record(&snapshot(2, &[-6.9], None), Some(14.0));
        let result = stats.calculate();
        assert!((result.rms_step - 0.2).abs() < 1e-4, "got {}", result.rms_step);
    }

    #[test]
    fn test_stats_skip_non_consecutive_frames() {
        let mut stats = SimulationStats::default();
        stats.record(&snapshot(1, &[0.0], None), None);
        stats.record(&snapshot(1, &[5.0], None), None);
        stats.record(&snapshot(5, &[9.0], None), None);
        let result = stats.calculate();
        assert_eq!(result.frames, 2);
        assert_eq!(result.rms_step, 0.0);
    }

    #[test]
    fn test_stats_new_batch_starts_new_baseline() {
        let mut stats = SimulationStats::default();
        stats.record(&batch_snapshot(1, 1, &[0.0, 0.0], None), None);
        stats.record(&batch_snapshot(1, 2, &[0.1, 0.0], None), None);
        // Reset between frames 2 and 3: same count, unrelated positions.
        stats.record(&batch_snapshot(2, 3, &[-6.0, 5.0], None), None);
        stats.record(&batch_snapshot(2, 4, &[-6.0, 5.1], None), None);

        let result = stats.calculate();
        assert_eq!(result.frames, 4);
        // Only the two in-batch steps count: sqrt((0.01 + 0 + 0 + 0.01) / 4)
        assert!(
            (result.rms_step - 0.005f64.sqrt()).abs() < 1e-5,
            "reset jump leaked into rms: {}",
            result.rms_step
        );
    }

    #[test]
    fn test_stats_clear() {
        let mut stats = SimulationStats::default();
        stats.record(&snapshot(1, &[0.0], None), None);
        stats.record(&snapshot(2, &[1.0], None), None);
        stats.time_since_report = 1.5;

        stats.clear();

        assert_eq!(stats.calculate().frames, 0);
        assert_eq!(stats.time_since_report, 0.0);

        // The baseline survives so the next frame still yields a step.
        stats.record(&snapshot(3, &[1.5], None), None);
        assert!((stats.calculate().rms_step - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_report_display() {
        let result = SimulationReport {
            frames: 300,
            particle_count: 1504,
            rms_step: 0.03812,
            mean_polarization: 0.0214,
        };

        let display = format!("{}", result);
        assert!(display.contains("Frames: 300"));
        assert!(display.contains("Particles: 1504"));
        assert!(display.contains("RMS step: 0.0381"));
        assert!(display.contains("Polarization: 0.021"));
    }
}
