//! Stable-Fluids Solver Kernel
//!
//! This crate provides the per-frame solver of Stam's stable-fluids method on
//! a 2D grid: semi-Lagrangian advection, pointer forcing, implicit viscous
//! diffusion and pressure projection, each expressed as a full-screen pass
//! over RGBA32F fields.
//!
//! # Modules
//! - [`field`] -- RGBA32F grids with clamp-to-border nearest sampling.
//! - [`ping_pong`] -- Double-buffered storage with commit-to-swap semantics.
//! - [`stage`] -- Stage kinds, sampler declarations and the frame schedule.
//! - [`uniforms`] -- Frame state, tuning constants and the uniform block.
//! - [`kernels`] -- Per-texel stage programs (CPU reference).
//! - [`binding`] -- Field ownership and per-stage input binding.
//! - [`cpu`] -- Rayon-parallel CPU backend.
//! - [`diagnostics`] -- Divergence, residual and field statistics.
//! - [`volume`] -- 3D fields tiled into a 2D atlas.
//! - [`shaders`] -- WGSL program composition.
//! - `gpu` -- wgpu render-pipeline backend (feature `gpu`).

#![warn(missing_docs)]

pub mod binding;
pub mod cpu;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod kernels;
pub mod pass;
pub mod ping_pong;
pub mod shaders;
pub mod stage;
pub mod uniforms;
pub mod volume;

#[cfg(feature = "gpu")]
#[allow(missing_docs)]
pub mod gpu;

pub use binding::{FieldSet, StageInputs};
pub use cpu::CpuSolver;
pub use diagnostics::{divergence_field, divergence_metrics, poisson_residual, FieldMetrics};
pub use error::KernelError;
pub use field::{Field, FieldSize, FieldSlot, BORDER};
pub use pass::execute_pass;
pub use ping_pong::PingPong;
pub use stage::{Sampler, Schedule, SolverStage, StageKind, FRAME_SCHEDULE};
pub use uniforms::{CompositeMode, FrameState, PointerSample, SolverConstants, StageParams};
pub use volume::{VolumeLayout, VolumeSample};

#[cfg(feature = "gpu")]
pub use gpu::{gpu_available, GpuSolver};

// ---------------------------------------------------------------------------
// FluidBackend trait
// ---------------------------------------------------------------------------

/// Trait that all solver back-ends (CPU, GPU) must implement.
///
/// A backend owns the compiled stage programs and every field buffer. The
/// host drives it through three setup calls and then, each frame:
///
/// 1. `run_pass` once per entry of the [`Schedule`]
/// 2. `end_frame` to flush the recorded work
///
/// A backend whose programs are not ready must not be asked to run passes;
/// the pipeline drops the frame instead.
pub trait FluidBackend {
    /// Short backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Grid resolution of every field.
    fn resolution(&self) -> FieldSize;

    /// Build one program per [`StageKind`].
    fn compile_programs(&mut self) -> Result<(), KernelError>;

    /// Allocate and clear every field buffer.
    fn allocate_fields(&mut self) -> Result<(), KernelError>;

    /// True once programs are compiled, fields allocated and the device is
    /// usable.
    fn programs_ready(&self) -> bool;

    /// Execute one pass of `kind` and commit its output.
    fn run_pass(&mut self, kind: StageKind, params: &StageParams) -> Result<(), KernelError>;

    /// Flush work recorded since the last call.
    fn end_frame(&mut self) -> Result<(), KernelError>;

    /// Copy the committed value of `slot` to host memory.
    fn read_field(&mut self, slot: FieldSlot) -> Result<Field, KernelError>;

    /// Overwrite the committed value of `slot`.
    fn write_field(&mut self, slot: FieldSlot, field: &Field) -> Result<(), KernelError>;

    /// Clear every field to `(0, 0, 0, 1)`.
    fn reset(&mut self) -> Result<(), KernelError>;
}

impl<B: FluidBackend + ?Sized> FluidBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resolution(&self) -> FieldSize {
        (**self).resolution()
    }

    fn compile_programs(&mut self) -> Result<(), KernelError> {
        (**self).compile_programs()
    }

    fn allocate_fields(&mut self) -> Result<(), KernelError> {
        (**self).allocate_fields()
    }

    fn programs_ready(&self) -> bool {
        (**self).programs_ready()
    }

    fn run_pass(&mut self, kind: StageKind, params: &StageParams) -> Result<(), KernelError> {
        (**self).run_pass(kind, params)
    }

    fn end_frame(&mut self) -> Result<(), KernelError> {
        (**self).end_frame()
    }

    fn read_field(&mut self, slot: FieldSlot) -> Result<Field, KernelError> {
        (**self).read_field(slot)
    }

    fn write_field(&mut self, slot: FieldSlot, field: &Field) -> Result<(), KernelError> {
        (**self).write_field(slot, field)
    }

    fn reset(&mut self) -> Result<(), KernelError> {
        (**self).reset()
    }
}

/// Run every pass of `schedule` for the frame described by `frame`, then
/// flush. Uniforms are computed once per stage kind.
pub fn run_frame<B: FluidBackend + ?Sized>(
    backend: &mut B,
    schedule: &Schedule,
    frame: &FrameState,
    constants: &SolverConstants,
    composite: CompositeMode,
) -> Result<(), KernelError> {
    let params = StageKind::ALL.map(|kind| StageParams::for_stage(kind, frame, constants, composite));
    for &kind in schedule.passes() {
        backend.run_pass(kind, &params[kind.index()])?;
    }
    backend.end_frame()
}
