//! Configuration parsing and validation for fluid pipelines

use serde::{Deserialize, Serialize};
use stam_kernel::{CompositeMode, FieldSize, SolverConstants};
use std::fs;

use crate::error::PipelineError;

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidConfig {
    /// Human-readable pipeline name
    pub name: String,
    /// Grid resolution [width, height] in texels
    pub resolution: [u32; 2],
    /// Jacobi iterations of viscous diffusion per frame
    #[serde(default = "default_diffusion_iterations")]
    pub diffusion_iterations: u32,
    /// Jacobi iterations of the pressure solve per frame
    #[serde(default = "default_pressure_iterations")]
    pub pressure_iterations: u32,
    /// Kinematic viscosity (uv^2/s)
    #[serde(default = "default_viscosity")]
    pub viscosity: f32,
    /// Pointer force scale
    #[serde(default = "default_force_multiplier")]
    pub force_multiplier: f32,
    /// Per-frame damping of advected fields
    #[serde(default = "default_decay")]
    pub decay: f32,
    /// Upper bound on the frame time step (seconds); unclamped when absent
    #[serde(default)]
    pub max_dt: Option<f32>,
    /// What the composite stage displays
    #[serde(default)]
    pub composite: CompositeMode,
    /// Which solver backend to use
    #[serde(default)]
    pub backend: BackendType,
    /// Where pointer input comes from
    #[serde(default)]
    pub input: InputConfig,
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendType {
    /// Rayon CPU solver
    Cpu,
    /// wgpu solver (requires the `gpu` feature)
    Gpu,
    /// GPU when available, else CPU
    #[default]
    Auto,
}

/// Pointer input source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum InputConfig {
    /// Events pushed by the host
    #[default]
    Device,
    /// Pointer orbiting the grid centre
    Scripted {
        /// Orbit radius as a fraction of the grid height
        #[serde(default = "default_orbit_radius")]
        orbit_radius: f32,
        /// Seconds per revolution
        #[serde(default = "default_orbit_period")]
        orbit_period: f32,
        /// Whether the scripted pointer is pressed
        #[serde(default = "default_true")]
        active: bool,
    },
}

// Default values
fn default_diffusion_iterations() -> u32 {
    stam_kernel::stage::DEFAULT_DIFFUSION_ITERATIONS
}

fn default_pressure_iterations() -> u32 {
    stam_kernel::stage::DEFAULT_PRESSURE_ITERATIONS
}

fn default_viscosity() -> f32 {
    SolverConstants::default().viscosity
}

fn default_force_multiplier() -> f32 {
    SolverConstants::default().force_multiplier
}

fn default_decay() -> f32 {
    SolverConstants::default().decay
}

fn default_orbit_radius() -> f32 {
    0.25
}

fn default_orbit_period() -> f32 {
    10.0
}

fn default_true() -> bool {
    true
}

impl FluidConfig {
    /// Configuration with every optional field at its default.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            resolution: [width, height],
            diffusion_iterations: default_diffusion_iterations(),
            pressure_iterations: default_pressure_iterations(),
            viscosity: default_viscosity(),
            force_multiplier: default_force_multiplier(),
            decay: default_decay(),
            max_dt: None,
            composite: CompositeMode::default(),
            backend: BackendType::default(),
            input: InputConfig::default(),
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read config file {path}: {e}")))?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: FluidConfig = serde_json::from_str(json)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::Config(msg.to_string()));

        if self.resolution[0] == 0 || self.resolution[1] == 0 {
            return invalid("Resolution must be at least 1x1");
        }
        if self.diffusion_iterations == 0 || self.pressure_iterations == 0 {
            return invalid("Iteration counts must be at least 1");
        }
        if self.viscosity < 0.0 || !self.viscosity.is_finite() {
            return invalid("Viscosity must be finite and non-negative");
        }
        if !self.force_multiplier.is_finite() {
            return invalid("Force multiplier must be finite");
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return invalid("Decay must be in range (0, 1]");
        }
        if let Some(max_dt) = self.max_dt {
            if max_dt.is_nan() || max_dt <= 0.0 {
                return invalid("max_dt must be positive");
            }
        }
        if let InputConfig::Scripted {
            orbit_radius,
            orbit_period,
            ..
        } = self.input
        {
            if !(0.0..=0.5).contains(&orbit_radius) {
                return invalid("Orbit radius must be in range [0, 0.5]");
            }
            if orbit_period.is_nan() || orbit_period <= 0.0 {
                return invalid("Orbit period must be positive");
            }
        }
        Ok(())
    }

    /// Grid resolution as a kernel size
    pub fn field_size(&self) -> Result<FieldSize, PipelineError> {
        Ok(FieldSize::new(self.resolution[0], self.resolution[1])?)
    }

    /// Solver constants with the configured overrides applied
    pub fn solver_constants(&self) -> SolverConstants {
        SolverConstants {
            viscosity: self.viscosity,
            force_multiplier: self.force_multiplier,
            decay: self.decay,
            ..SolverConstants::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_uses_defaults() {
        let config = FluidConfig::from_json(r#"{ "name": "t", "resolution": [64, 32] }"#).unwrap();
        assert_eq!(config.diffusion_iterations, 20);
        assert_eq!(config.pressure_iterations, 40);
        assert_eq!(config.viscosity, 1.0);
        assert_eq!(config.force_multiplier, 0.3);
        assert_eq!(config.decay, 0.995);
        assert_eq!(config.max_dt, None);
        assert_eq!(config.backend, BackendType::Auto);
        assert_eq!(config.input, InputConfig::Device);
        assert_eq!(config.composite, CompositeMode::Quantity);
    }

    #[test]
    fn scripted_input_parses() {
        let config = FluidConfig::from_json(
            r#"{
                "name": "orbit",
                "resolution": [128, 128],
                "backend": "Cpu",
                "composite": "velocity",
                "input": { "Scripted": { "orbit_radius": 0.3 } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendType::Cpu);
        assert_eq!(config.composite, CompositeMode::Velocity);
        assert_eq!(
            config.input,
            InputConfig::Scripted {
                orbit_radius: 0.3,
                orbit_period: 10.0,
                active: true
            }
        );
    }

    #[test]
    fn rejects_zero_resolution() {
        let err = FluidConfig::from_json(r#"{ "name": "t", "resolution": [0, 32] }"#);
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }

    #[test]
    fn rejects_bad_decay_and_dt() {
        let mut config = FluidConfig::new("t", 8, 8);
        config.decay = 1.5;
        assert!(config.validate().is_err());
        config.decay = 0.0;
        assert!(config.validate().is_err());
        config.decay = 0.9;
        config.max_dt = Some(0.0);
        assert!(config.validate().is_err());
        config.max_dt = Some(0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_nan_timing() {
        let mut config = FluidConfig::new("t", 8, 8);
        config.max_dt = Some(f32::NAN);
        assert!(config.validate().is_err());

        config.max_dt = None;
        config.input = InputConfig::Scripted {
            orbit_radius: 0.25,
            orbit_period: f32::NAN,
            active: true,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_iterations() {
        let err = FluidConfig::from_json(
            r#"{ "name": "t", "resolution": [8, 8], "pressure_iterations": 0 }"#,
        );
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }

    #[test]
    fn constants_carry_overrides() {
        let mut config = FluidConfig::new("t", 8, 8);
        config.viscosity = 0.5;
        let c = config.solver_constants();
        assert_eq!(c.viscosity, 0.5);
        assert_eq!(c.splat_radius, SolverConstants::default().splat_radius);
    }
}
