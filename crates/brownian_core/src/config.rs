//! Simulation configuration and the Stokes–Einstein noise derivation.
//!
//! Defaults reproduce the reference bacteria scene: 1500 small swimmers and a
//! handful of larger tracers in a periodic box of half-width 7, at body
//! temperature in water.
//!
//! Configurations round-trip through JSON so a run can be described in a file:
//!
//! ```ignore
//! let config = SimulationConfig::load_json("scenes/mips.json")?;
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::boundary::BoundaryPolicy;

/// Errors produced while loading or validating a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A scalar parameter is out of range or not finite.
    InvalidParameter { name: &'static str, value: f64 },
    /// A species entry is unusable.
    InvalidSpecies { index: usize, reason: String },
    /// Reflection needs an orientation to reflect.
    ReflectingWithoutPropulsion,
    /// File system error
    Io(std::io::Error),
    /// JSON (de)serialization error
    Json(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidParameter { name, value } => {
                write!(f, "Invalid parameter {}: {}", name, value)
            }
            ConfigError::InvalidSpecies { index, reason } => {
                write!(f, "Invalid species #{}: {}", index, reason)
            }
            ConfigError::ReflectingWithoutPropulsion => write!(
                f,
                "Reflecting sphere boundary requires propulsion (particle orientations)"
            ),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e.to_string())
    }
}

/// Spatial domain the particles live in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundaryKind {
    /// No constraint.
    Unbounded,
    /// Cube `[-h, h]^3` with per-axis wraparound.
    PeriodicCubic { half_width: f32 },
    /// Ball of radius `R`; escaping particles are pulled back onto the surface.
    ClampingSphere { radius: f32 },
    /// Ball of radius `R`; escaping particles are put on the surface and their
    /// heading is mirrored about the surface normal.
    ReflectingSphere { radius: f32 },
}

impl Default for BoundaryKind {
    fn default() -> Self {
        BoundaryKind::PeriodicCubic { half_width: 7.0 }
    }
}

/// Rigid-body material for one species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesPhysics {
    /// Linear damping; large values emulate an overdamped (viscous) medium.
    pub linear_damping: f32,
    /// 1.0 gives elastic contacts.
    pub restitution: f32,
    pub friction: f32,
    pub density: f32,
}

impl Default for SpeciesPhysics {
    fn default() -> Self {
        Self {
            linear_damping: 10_000.0,
            restitution: 1.0,
            friction: 0.0,
            density: 1e-7,
        }
    }
}

/// One family of identical particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    /// Radius in simulation units (also micrometres for the noise derivation).
    pub radius: f32,
    pub count: usize,
    /// Display color as 0xRRGGBB, passed through to the renderer.
    pub color: u32,
    #[serde(default)]
    pub physics: SpeciesPhysics,
}

impl Species {
    pub fn new(name: impl Into<String>, radius: f32, count: usize, color: u32) -> Self {
        Self {
            name: name.into(),
            radius,
            count,
            color,
            physics: SpeciesPhysics::default(),
        }
    }
}

/// Physical constants feeding the Stokes–Einstein relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalParams {
    /// Kelvin (310 K = 37 °C).
    pub temperature_kelvin: f64,
    /// Dynamic viscosity in Pa·s.
    pub viscosity: f64,
    /// J/K
    pub boltzmann: f64,
    /// Length of one simulation unit in micrometres.
    pub micrometres_per_unit: f64,
}

impl Default for ThermalParams {
    fn default() -> Self {
        Self {
            temperature_kelvin: 310.0,
            viscosity: 0.0008,
            boltzmann: 1.38e-23,
            micrometres_per_unit: 0.641,
        }
    }
}

impl ThermalParams {
    /// Stokes–Einstein diffusion coefficient in m²/s for a sphere whose
    /// radius is given in micrometres: `D = k_B T / (6 π η r)`.
    pub fn diffusion_coefficient_si(&self, radius_um: f64) -> f64 {
        self.boltzmann * self.temperature_kelvin
            / (6.0 * std::f64::consts::PI * self.viscosity * radius_um * 1e-6)
    }

    /// Diffusion coefficient in simulation units² per second.
    pub fn diffusion_coefficient(&self, radius_um: f64) -> f64 {
        let scale = 1e6 / self.micrometres_per_unit;
        self.diffusion_coefficient_si(radius_um) * scale * scale
    }

    /// Per-axis displacement standard deviation for one step of length `dt`,
    /// in simulation units: `sqrt(2 D dt)` metres rescaled by `1e6 / µm-per-unit`.
    pub fn translational_sd(&self, radius_um: f64, dt: f64) -> f32 {
        let sd_metres = (2.0 * self.diffusion_coefficient_si(radius_um) * dt).sqrt();
        (sd_metres * 1e6 / self.micrometres_per_unit) as f32
    }
}

/// Complete description of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub species: Vec<Species>,
    /// When false, particles carry no orientation and only diffuse.
    pub propulsion_enabled: bool,
    /// Self-propulsion speed in units per second.
    pub propulsion_speed: f32,
    /// Rotational diffusion coefficient `D_r` in rad²/s.
    pub rotational_diffusion: f32,
    /// Multiplier on the derived translational noise.
    pub noise_scale: f32,
    /// Simulation step `dt` in seconds.
    pub timestep: f32,
    /// Tick of the collision solver, independent of `timestep`.
    pub physics_timestep: f32,
    pub boundary: BoundaryKind,
    /// Placement half-width used when the domain is unbounded.
    pub spawn_half_width: f32,
    pub thermal: ThermalParams,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            species: vec![
                Species::new("bacteria", 0.3, 1500, 0xff0000),
                Species::new("tracer", 0.3 * 2.12, 4, 0x00ffff),
            ],
            propulsion_enabled: true,
            propulsion_speed: 100.0,
            rotational_diffusion: 0.5,
            noise_scale: 1.0,
            timestep: 0.0001,
            physics_timestep: 1.0 / 60.0,
            boundary: BoundaryKind::default(),
            spawn_half_width: 7.0,
            thermal: ThermalParams::default(),
            seed: None,
        }
    }
}

fn check_non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value: value as f64,
        })
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value: value as f64,
        })
    }
}

fn check_positive_f64(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}

impl SimulationConfig {
    /// Single-species convenience constructor used by tests and small scenes.
    pub fn single_species(radius: f32, count: usize) -> Self {
        Self {
            species: vec![Species::new("particle", radius, count, 0xffffff)],
            ..Default::default()
        }
    }

    /// Check every parameter before any particle is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("propulsion_speed", self.propulsion_speed)?;
        check_non_negative("rotational_diffusion", self.rotational_diffusion)?;
        check_non_negative("noise_scale", self.noise_scale)?;
        check_positive("timestep", self.timestep)?;
        check_positive("physics_timestep", self.physics_timestep)?;
        check_positive("spawn_half_width", self.spawn_half_width)?;
        check_positive_f64("thermal.temperature_kelvin", self.thermal.temperature_kelvin)?;
        check_positive_f64("thermal.viscosity", self.thermal.viscosity)?;
        check_positive_f64("thermal.boltzmann", self.thermal.boltzmann)?;
        check_positive_f64(
            "thermal.micrometres_per_unit",
            self.thermal.micrometres_per_unit,
        )?;

        match self.boundary {
            BoundaryKind::Unbounded => {}
            BoundaryKind::PeriodicCubic { half_width } => {
                check_positive("boundary.half_width", half_width)?
            }
            BoundaryKind::ClampingSphere { radius } => check_positive("boundary.radius", radius)?,
            BoundaryKind::ReflectingSphere { radius } => {
                check_positive("boundary.radius", radius)?
            }
        }
        if BoundaryPolicy::from(self.boundary).needs_orientation() && !self.propulsion_enabled {
            return Err(ConfigError::ReflectingWithoutPropulsion);
        }

        for (index, species) in self.species.iter().enumerate() {
            if !(species.radius.is_finite() && species.radius > 0.0) {
                return Err(ConfigError::InvalidSpecies {
                    index,
                    reason: format!("radius must be positive, got {}", species.radius),
                });
            }
            let p = &species.physics;
            let material_ok = [p.linear_damping, p.restitution, p.friction, p.density]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0);
            if !material_ok {
                return Err(ConfigError::InvalidSpecies {
                    index,
                    reason: format!("physics parameters must be finite and non-negative: {:?}", p),
                });
            }
        }

        Ok(())
    }

    /// Total particle count across all species.
    pub fn total_particles(&self) -> usize {
        self.species.iter().map(|s| s.count).sum()
    }

    /// Translational noise sd for a species at the current `timestep` and
    /// `noise_scale`.
    pub fn translational_sd(&self, species: &Species) -> f32 {
        self.thermal
            .translational_sd(species.radius as f64, self.timestep as f64)
            * self.noise_scale
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
