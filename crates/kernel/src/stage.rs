//! Solver stage descriptors and the per-frame schedule.
//!
//! Each [`StageKind`] names one full-screen pass: which fields it samples,
//! which slot it renders into, and how often it repeats within a frame.

use serde::{Deserialize, Serialize};

use crate::field::FieldSlot;

/// Named texture inputs a stage program may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sampler {
    /// Committed velocity.
    Velocity,
    /// Divergence scratch buffer.
    Scratch,
    /// Committed pressure.
    Pressure,
    /// Committed advected quantity.
    Quantity,
}

impl Sampler {
    /// Texture identifier used by the GPU programs.
    pub fn binding_name(self) -> &'static str {
        match self {
            Sampler::Velocity => "velocity_field",
            Sampler::Scratch => "scratch_field",
            Sampler::Pressure => "pressure_field",
            Sampler::Quantity => "quantity_field",
        }
    }
}

/// One pass of the stable-fluids frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Semi-Lagrangian self-advection of velocity.
    AdvectVelocity,
    /// Semi-Lagrangian advection of the quantity plus pointer splat.
    AdvectQuantity,
    /// Pointer impulse added to velocity.
    Force,
    /// One Jacobi iteration of viscous diffusion.
    Diffuse,
    /// Velocity divergence into the scratch buffer.
    Divergence,
    /// One Jacobi iteration of the pressure Poisson equation.
    Pressure,
    /// Pressure gradient subtraction.
    Gradient,
    /// Display composite.
    Composite,
}

impl StageKind {
    /// Every stage, in schedule order.
    pub const ALL: [StageKind; 8] = FRAME_SCHEDULE;

    /// Dense index, matching the position in [`StageKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Samplers the stage program reads. Bindings are declared in this order.
    pub fn samplers(self) -> &'static [Sampler] {
        use Sampler::*;
        match self {
            StageKind::AdvectVelocity => &[Velocity],
            StageKind::AdvectQuantity => &[Velocity, Quantity],
            StageKind::Force => &[Velocity],
            StageKind::Diffuse => &[Velocity],
            StageKind::Divergence => &[Velocity],
            StageKind::Pressure => &[Pressure, Scratch],
            StageKind::Gradient => &[Pressure, Velocity],
            StageKind::Composite => &[Velocity, Scratch, Pressure, Quantity],
        }
    }

    /// Slot the stage renders into.
    pub fn output(self) -> FieldSlot {
        match self {
            StageKind::AdvectVelocity
            | StageKind::Force
            | StageKind::Diffuse
            | StageKind::Gradient => FieldSlot::Velocity,
            StageKind::AdvectQuantity => FieldSlot::Quantity,
            StageKind::Divergence => FieldSlot::Scratch,
            StageKind::Pressure => FieldSlot::Pressure,
            StageKind::Composite => FieldSlot::Composite,
        }
    }

    /// Whether the stage samples the field it writes.
    pub fn reads_own_output(self) -> bool {
        let out = self.output();
        self.samplers().iter().any(|s| match s {
            Sampler::Velocity => out == FieldSlot::Velocity,
            Sampler::Pressure => out == FieldSlot::Pressure,
            Sampler::Quantity => out == FieldSlot::Quantity,
            Sampler::Scratch => out == FieldSlot::Scratch,
        })
    }

    /// Short label used for pipeline and log names.
    pub fn label(self) -> &'static str {
        match self {
            StageKind::AdvectVelocity => "advect_velocity",
            StageKind::AdvectQuantity => "advect_quantity",
            StageKind::Force => "force",
            StageKind::Diffuse => "diffuse",
            StageKind::Divergence => "divergence",
            StageKind::Pressure => "pressure",
            StageKind::Gradient => "gradient",
            StageKind::Composite => "composite",
        }
    }
}

/// A stage kind paired with the backend program that executes it.
#[derive(Debug)]
pub struct SolverStage<P> {
    kind: StageKind,
    program: P,
}

impl<P> SolverStage<P> {
    /// Wrap a compiled `program` for `kind`.
    pub fn new(kind: StageKind, program: P) -> Self {
        Self { kind, program }
    }

    /// Stage this program implements.
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Backend program.
    pub fn program(&self) -> &P {
        &self.program
    }
}

/// Build one [`SolverStage`] per kind, indexed by [`StageKind::index`].
pub fn compile_stages<P, E>(
    mut compile: impl FnMut(StageKind) -> Result<P, E>,
) -> Result<Vec<SolverStage<P>>, E> {
    StageKind::ALL
        .iter()
        .map(|&kind| compile(kind).map(|program| SolverStage::new(kind, program)))
        .collect()
}

/// Stage order of one frame, before iteration expansion.
pub const FRAME_SCHEDULE: [StageKind; 8] = [
    StageKind::AdvectVelocity,
    StageKind::AdvectQuantity,
    StageKind::Force,
    StageKind::Diffuse,
    StageKind::Divergence,
    StageKind::Pressure,
    StageKind::Gradient,
    StageKind::Composite,
];

/// Default Jacobi iterations for viscous diffusion.
pub const DEFAULT_DIFFUSION_ITERATIONS: u32 = 20;
/// Default Jacobi iterations for the pressure solve.
pub const DEFAULT_PRESSURE_ITERATIONS: u32 = 40;

/// Flattened pass list for one frame with Jacobi stages repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    passes: Vec<StageKind>,
    diffusion_iterations: u32,
    pressure_iterations: u32,
}

impl Schedule {
    /// Expand [`FRAME_SCHEDULE`] with the given iteration counts.
    pub fn new(diffusion_iterations: u32, pressure_iterations: u32) -> Self {
        let passes = FRAME_SCHEDULE
            .iter()
            .flat_map(|&kind| {
                let repeat = match kind {
                    StageKind::Diffuse => diffusion_iterations,
                    StageKind::Pressure => pressure_iterations,
                    _ => 1,
                };
                std::iter::repeat(kind).take(repeat as usize)
            })
            .collect();
        Self {
            passes,
            diffusion_iterations,
            pressure_iterations,
        }
    }

    /// All passes in execution order.
    pub fn passes(&self) -> &[StageKind] {
        &self.passes
    }

    /// Pass at `index`; `None` past the end of the frame.
    pub fn pass(&self, index: usize) -> Option<StageKind> {
        debug_assert!(
            index < self.passes.len(),
            "pass index {index} out of range ({} passes)",
            self.passes.len()
        );
        self.passes.get(index).copied()
    }

    /// Number of passes per frame.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// True when the schedule has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Diffusion passes per frame.
    pub fn diffusion_iterations(&self) -> u32 {
        self.diffusion_iterations
    }

    /// Pressure passes per frame.
    pub fn pressure_iterations(&self) -> u32 {
        self.pressure_iterations
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFUSION_ITERATIONS, DEFAULT_PRESSURE_ITERATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_matches_index() {
        for (i, kind) in StageKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn default_schedule_shape() {
        let s = Schedule::default();
        assert_eq!(s.len(), 6 + 20 + 40);
        assert_eq!(s.pass(0), Some(StageKind::AdvectVelocity));
        assert_eq!(s.pass(1), Some(StageKind::AdvectQuantity));
        assert_eq!(s.pass(2), Some(StageKind::Force));
        assert!(s.passes()[3..23].iter().all(|k| *k == StageKind::Diffuse));
        assert_eq!(s.pass(23), Some(StageKind::Divergence));
        assert!(s.passes()[24..64].iter().all(|k| *k == StageKind::Pressure));
        assert_eq!(s.pass(64), Some(StageKind::Gradient));
        assert_eq!(s.pass(65), Some(StageKind::Composite));
    }

    #[test]
    fn zero_iterations_skip_jacobi_stages() {
        let s = Schedule::new(0, 0);
        assert_eq!(
            s.passes(),
            &[
                StageKind::AdvectVelocity,
                StageKind::AdvectQuantity,
                StageKind::Force,
                StageKind::Divergence,
                StageKind::Gradient,
                StageKind::Composite,
            ]
        );
    }

    #[test]
    fn self_sampling_stages() {
        assert!(StageKind::Diffuse.reads_own_output());
        assert!(StageKind::Pressure.reads_own_output());
        assert!(StageKind::Gradient.reads_own_output());
        assert!(!StageKind::Divergence.reads_own_output());
        assert!(!StageKind::Composite.reads_own_output());
    }

    #[test]
    fn samplers_are_minimal() {
        assert_eq!(StageKind::Divergence.samplers(), &[Sampler::Velocity]);
        assert!(!StageKind::Force.samplers().contains(&Sampler::Quantity));
    }
}
