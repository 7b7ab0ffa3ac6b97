//! Orchestration errors.

use stam_kernel::KernelError;
use thiserror::Error;

/// Failures raised while configuring or driving a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration could not be read, parsed or validated.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `update` was called before initialization completed.
    #[error("pipeline not initialized")]
    NotInitialized,

    /// The requested backend cannot be created in this build or on this host.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A backend call failed.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}
