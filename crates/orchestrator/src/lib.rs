//! Orchestration Layer
//!
//! This crate drives the stable-fluids solver, including:
//! - JSON configuration loading and validation
//! - Pointer input sources (host device events, scripted paths)
//! - Backend selection with GPU-to-CPU fallback
//! - The fluid pipeline state machine and per-frame stage schedule

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;

pub use config::{BackendType, FluidConfig, InputConfig};
pub use error::PipelineError;
pub use input::{DeviceHandle, DeviceInput, InputSource, ScriptedInput};
pub use pipeline::{FluidPipeline, FrameClock, FrameOutcome, PipelineSettings, PipelineState};

use stam_kernel::{CpuSolver, FieldSize, FluidBackend};

/// Boxed backend chosen at runtime.
pub type DynBackend = Box<dyn FluidBackend>;

/// Create a complete pipeline from a configuration file
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use stam_orchestrator::create_pipeline_from_file;
///
/// let (mut pipeline, _device) = create_pipeline_from_file("configs/orbit.json")?;
/// pipeline.update(Duration::from_millis(16))?;
/// let image = pipeline.final_composite()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_pipeline_from_file(
    config_path: &str,
) -> Result<(FluidPipeline<DynBackend>, Option<DeviceHandle>), PipelineError> {
    tracing::info!("Creating pipeline from config: {}", config_path);
    let config = FluidConfig::load(config_path)?;
    create_pipeline(&config)
}

/// Create and initialize a pipeline for `config`.
///
/// Returns the device handle when the configuration uses device input.
pub fn create_pipeline(
    config: &FluidConfig,
) -> Result<(FluidPipeline<DynBackend>, Option<DeviceHandle>), PipelineError> {
    let (input, handle) = input::from_config(&config.input);
    let pipeline = create_pipeline_with_input(config, input)?;
    Ok((pipeline, handle))
}

/// Create and initialize a pipeline for `config`, taking pointer input from
/// `input` instead of the configured source.
pub fn create_pipeline_with_input(
    config: &FluidConfig,
    input: Box<dyn InputSource>,
) -> Result<FluidPipeline<DynBackend>, PipelineError> {
    config.validate()?;
    tracing::info!("Configuration loaded: {}", config.name);

    let size = config.field_size()?;
    let backend = create_backend(config.backend, size)?;
    FluidPipeline::new(backend, PipelineSettings::from_config(config), input)
}

// ===========================================================================
// Backend selection helper
// ===========================================================================

/// Create a solver backend based on the backend configuration.
///
/// For `Auto`, attempts GPU first and falls back to CPU if unavailable.
/// For `Gpu`, returns a GPU backend or an error if it cannot be created.
/// For `Cpu`, always returns a CPU backend.
pub fn create_backend(backend: BackendType, size: FieldSize) -> Result<DynBackend, PipelineError> {
    match backend {
        BackendType::Cpu => {
            tracing::info!("Creating CPU solver...");
            Ok(Box::new(CpuSolver::new(size)))
        }
        #[cfg(feature = "gpu")]
        BackendType::Gpu => {
            tracing::info!("Creating GPU solver...");
            let gpu = stam_kernel::GpuSolver::new(size)
                .map_err(|e| PipelineError::BackendUnavailable(e.to_string()))?;
            Ok(Box::new(gpu))
        }
        #[cfg(not(feature = "gpu"))]
        BackendType::Gpu => Err(PipelineError::BackendUnavailable(
            "GPU backend requested but 'gpu' feature is not enabled. Compile with --features gpu"
                .into(),
        )),
        #[cfg(feature = "gpu")]
        BackendType::Auto => {
            tracing::info!("Auto-detecting backend...");
            match stam_kernel::GpuSolver::new(size) {
                Ok(gpu) => {
                    tracing::info!("GPU available, using GPU solver");
                    Ok(Box::new(gpu))
                }
                Err(e) => {
                    tracing::warn!("GPU solver unavailable ({e}), falling back to CPU");
                    Ok(Box::new(CpuSolver::new(size)))
                }
            }
        }
        #[cfg(not(feature = "gpu"))]
        BackendType::Auto => {
            tracing::info!("GPU feature not enabled, using CPU solver");
            Ok(Box::new(CpuSolver::new(size)))
        }
    }
}
