use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use brownian_core::SimulationConfig;
use brownian_physics::{SimulationPlugin, SimulationReportPlugin};

fn main() {
    // Optional JSON config path; defaults otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => match SimulationConfig::load_json(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };

    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(bevy::log::LogPlugin::default())
        .add_plugins(SimulationPlugin::new(config))
        .add_plugins(SimulationReportPlugin)
        .run();
}
