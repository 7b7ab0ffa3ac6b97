//! Error type shared by every solver backend.

use thiserror::Error;

use crate::field::FieldSlot;
use crate::stage::{Sampler, StageKind};

/// Failures raised by field storage, stage binding and backend execution.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A field was requested with a zero dimension.
    #[error("invalid field size {width}x{height}")]
    InvalidSize {
        /// Requested width in texels.
        width: u32,
        /// Requested height in texels.
        height: u32,
    },

    /// `commit` was called on a ping-pong pair with no write in flight.
    #[error("ping-pong commit without a pending write")]
    CommitWithoutWrite,

    /// A stage read from a sampler that was never bound for it.
    #[error("stage {stage:?} has no binding for sampler {sampler:?}")]
    MissingBinding {
        /// Stage being executed.
        stage: StageKind,
        /// Sampler it tried to read.
        sampler: Sampler,
    },

    /// Passes were issued before the backend finished its setup phase.
    #[error("backend {0} before initialization completed")]
    NotInitialized(&'static str),

    /// An uploaded field does not match the solver resolution.
    #[error("field {slot:?} is {found_width}x{found_height}, expected {width}x{height}")]
    SizeMismatch {
        /// Slot being written.
        slot: FieldSlot,
        /// Solver width.
        width: u32,
        /// Solver height.
        height: u32,
        /// Width of the rejected field.
        found_width: u32,
        /// Height of the rejected field.
        found_height: u32,
    },

    /// No GPU adapter or device could be acquired.
    #[error("GPU initialization failed: {0}")]
    GpuInit(String),

    /// A stage program failed to compile or validate.
    #[error("shader for stage {stage:?} failed validation: {message}")]
    ShaderCompilation {
        /// Stage whose program was rejected.
        stage: StageKind,
        /// Validation message from the driver.
        message: String,
    },

    /// The device was lost or a readback failed.
    #[error("GPU device error: {0}")]
    Device(String),
}
