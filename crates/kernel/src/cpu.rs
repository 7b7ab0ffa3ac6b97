//! Reference CPU backend.
//!
//! Runs every stage program from [`crate::kernels`] over an in-memory
//! [`FieldSet`], parallelised across rows with rayon. Used for tests, for
//! headless hosts and as the fallback when no GPU adapter is available.

use std::time::Instant;

use tracing::{debug, info};

use crate::binding::{FieldSet, StageInputs};
use crate::error::KernelError;
use crate::field::{Field, FieldSize, FieldSlot};
use crate::kernels;
use crate::pass::execute_pass;
use crate::stage::{compile_stages, Sampler, SolverStage, StageKind};
use crate::uniforms::StageParams;
use crate::FluidBackend;

/// CPU counterpart of a compiled fragment program.
#[derive(Debug, Clone, Copy)]
pub struct CpuProgram {
    kind: StageKind,
}

impl CpuProgram {
    /// "Compile" the program for `kind`. Always succeeds.
    pub fn compile(kind: StageKind) -> Result<Self, KernelError> {
        Ok(Self { kind })
    }

    /// Render `output` from `inputs`.
    pub fn run(
        &self,
        inputs: &StageInputs<'_, Field>,
        output: &mut Field,
        params: &StageParams,
    ) -> Result<(), KernelError> {
        match self.kind {
            StageKind::AdvectVelocity => {
                let velocity = inputs.get(Sampler::Velocity)?;
                execute_pass(output, |uv| {
                    kernels::advect(uv, velocity, velocity, params) * params.decay
                });
            }
            StageKind::AdvectQuantity => {
                let velocity = inputs.get(Sampler::Velocity)?;
                let quantity = inputs.get(Sampler::Quantity)?;
                execute_pass(output, |uv| {
                    (kernels::advect(uv, velocity, quantity, params) + kernels::splat(uv, params))
                        * params.decay
                });
            }
            StageKind::Force => {
                let velocity = inputs.get(Sampler::Velocity)?;
                execute_pass(output, |uv| {
                    velocity.sample(uv) + kernels::pointer_force(uv, params).extend(0.0).extend(0.0)
                });
            }
            StageKind::Diffuse => {
                let velocity = inputs.get(Sampler::Velocity)?;
                if params.rbeta <= 0.0 {
                    execute_pass(output, |uv| velocity.sample(uv));
                } else {
                    let texel = params.texel();
                    execute_pass(output, |uv| {
                        kernels::jacobi(uv, velocity, velocity, params.alpha, params.rbeta, texel)
                    });
                }
            }
            StageKind::Divergence => {
                let velocity = inputs.get(Sampler::Velocity)?;
                execute_pass(output, |uv| kernels::divergence(uv, velocity, params));
            }
            StageKind::Pressure => {
                let pressure = inputs.get(Sampler::Pressure)?;
                let divergence = inputs.get(Sampler::Scratch)?;
                let texel = params.texel();
                execute_pass(output, |uv| {
                    kernels::jacobi(uv, pressure, divergence, params.alpha, params.rbeta, texel)
                });
            }
            StageKind::Gradient => {
                let pressure = inputs.get(Sampler::Pressure)?;
                let velocity = inputs.get(Sampler::Velocity)?;
                execute_pass(output, |uv| {
                    kernels::subtract_gradient(uv, pressure, velocity, params)
                });
            }
            StageKind::Composite => {
                let velocity = inputs.get(Sampler::Velocity)?;
                let scratch = inputs.get(Sampler::Scratch)?;
                let pressure = inputs.get(Sampler::Pressure)?;
                let quantity = inputs.get(Sampler::Quantity)?;
                execute_pass(output, |uv| {
                    kernels::composite(uv, velocity, scratch, pressure, quantity, params)
                });
            }
        }
        Ok(())
    }
}

/// In-memory stable-fluids solver.
pub struct CpuSolver {
    size: FieldSize,
    stages: Option<Vec<SolverStage<CpuProgram>>>,
    fields: Option<FieldSet<Field>>,
    passes_run: u64,
}

impl CpuSolver {
    /// Solver for a `size` grid; programs and fields are not yet set up.
    pub fn new(size: FieldSize) -> Self {
        Self {
            size,
            stages: None,
            fields: None,
            passes_run: 0,
        }
    }

    /// Solver with programs compiled and fields allocated.
    pub fn ready(size: FieldSize) -> Result<Self, KernelError> {
        let mut solver = Self::new(size);
        solver.compile_programs()?;
        solver.allocate_fields()?;
        Ok(solver)
    }

    /// Committed value of `slot`.
    pub fn field(&self, slot: FieldSlot) -> Result<&Field, KernelError> {
        self.fields
            .as_ref()
            .map(|f| f.current(slot))
            .ok_or(KernelError::NotInitialized("field read"))
    }

    /// Total passes executed since creation.
    pub fn passes_run(&self) -> u64 {
        self.passes_run
    }
}

impl FluidBackend for CpuSolver {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn resolution(&self) -> FieldSize {
        self.size
    }

    fn compile_programs(&mut self) -> Result<(), KernelError> {
        let start = Instant::now();
        self.stages = Some(compile_stages(CpuProgram::compile)?);
        debug!("CPU stage programs ready in {:?}", start.elapsed());
        Ok(())
    }

    fn allocate_fields(&mut self) -> Result<(), KernelError> {
        let size = self.size;
        self.fields = Some(FieldSet::new(|_| Field::new(size)));
        info!(
            "CPU solver allocated {}x{} fields ({} threads)",
            size.width,
            size.height,
            rayon::current_num_threads()
        );
        Ok(())
    }

    fn programs_ready(&self) -> bool {
        self.stages.is_some() && self.fields.is_some()
    }

    fn run_pass(&mut self, kind: StageKind, params: &StageParams) -> Result<(), KernelError> {
        let stages = self
            .stages
            .as_ref()
            .ok_or(KernelError::NotInitialized("pass issued"))?;
        let fields = self
            .fields
            .as_mut()
            .ok_or(KernelError::NotInitialized("pass issued"))?;
        let (inputs, output) = fields.bind(kind);
        stages[kind.index()].program().run(&inputs, output, params)?;
        fields.commit(kind)?;
        self.passes_run += 1;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), KernelError> {
        Ok(())
    }

    fn read_field(&mut self, slot: FieldSlot) -> Result<Field, KernelError> {
        self.field(slot).cloned()
    }

    fn write_field(&mut self, slot: FieldSlot, field: &Field) -> Result<(), KernelError> {
        check_size(self.size, slot, field)?;
        let fields = self
            .fields
            .as_mut()
            .ok_or(KernelError::NotInitialized("field write"))?;
        *fields.current_mut(slot) = field.clone();
        Ok(())
    }

    fn reset(&mut self) -> Result<(), KernelError> {
        if let Some(fields) = self.fields.as_mut() {
            fields.reset_with(Field::clear);
        }
        Ok(())
    }
}

/// Reject uploads whose size differs from the solver grid.
pub(crate) fn check_size(size: FieldSize, slot: FieldSlot, field: &Field) -> Result<(), KernelError> {
    let found = field.size();
    if found != size {
        return Err(KernelError::SizeMismatch {
            slot,
            width: size.width,
            height: size.height,
            found_width: found.width,
            found_height: found.height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::{CompositeMode, FrameState, SolverConstants};
    use glam::Vec4;

    #[test]
    fn passes_before_setup_are_rejected() {
        let mut solver = CpuSolver::new(FieldSize::square(8).unwrap());
        assert!(!solver.programs_ready());
        let frame = FrameState::new(solver.resolution());
        let params = StageParams::for_stage(
            StageKind::Divergence,
            &frame,
            &SolverConstants::default(),
            CompositeMode::Quantity,
        );
        assert!(matches!(
            solver.run_pass(StageKind::Divergence, &params),
            Err(KernelError::NotInitialized(_))
        ));
    }

    #[test]
    fn write_then_read_round_trips() {
        let size = FieldSize::square(8).unwrap();
        let mut solver = CpuSolver::ready(size).unwrap();
        let f = Field::filled(size, Vec4::new(1.0, 2.0, 3.0, 4.0));
        solver.write_field(FieldSlot::Quantity, &f).unwrap();
        assert_eq!(solver.read_field(FieldSlot::Quantity).unwrap(), f);
    }

    #[test]
    fn write_rejects_wrong_size() {
        let mut solver = CpuSolver::ready(FieldSize::square(8).unwrap()).unwrap();
        let f = Field::new(FieldSize::square(4).unwrap());
        assert!(matches!(
            solver.write_field(FieldSlot::Velocity, &f),
            Err(KernelError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn reset_clears_fields() {
        let size = FieldSize::square(4).unwrap();
        let mut solver = CpuSolver::ready(size).unwrap();
        let f = Field::filled(size, Vec4::ONE);
        solver.write_field(FieldSlot::Velocity, &f).unwrap();
        solver.reset().unwrap();
        assert_eq!(solver.read_field(FieldSlot::Velocity).unwrap(), Field::new(size));
    }
}
