//! Fluid pipeline with lifecycle management
//!
//! `FluidPipeline` owns a solver backend and an input source and drives one
//! full stage schedule per [`FluidPipeline::update`]. Setup moves through
//! `Uninitialized -> ShadersLoaded -> FieldsAllocated -> Ready`; while a frame
//! runs the state names the stage in flight.

use std::time::{Duration, Instant};

use stam_kernel::{
    CompositeMode, Field, FieldSlot, FluidBackend, FrameState, Schedule, SolverConstants,
    StageKind, StageParams,
};

use crate::config::FluidConfig;
use crate::error::PipelineError;
use crate::input::InputSource;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing set up yet, or setup failed
    Uninitialized,
    /// Stage programs compiled
    ShadersLoaded,
    /// Field buffers allocated
    FieldsAllocated,
    /// Idle between frames
    Ready,
    /// Executing the given stage
    Running(StageKind),
}

/// Result of one `update` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Every scheduled pass ran
    Completed {
        /// Frame counter seen by the stages
        frame: u32,
    },
    /// The backend was not ready; frame state advanced but no pass ran
    Dropped {
        /// Frame counter of the skipped frame
        frame: u32,
    },
}

/// Per-pipeline tunables
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Expanded stage schedule
    pub schedule: Schedule,
    /// Physical and visual constants
    pub constants: SolverConstants,
    /// Composite display mode
    pub composite: CompositeMode,
    /// Optional clamp on the frame time step
    pub max_dt: Option<f32>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            schedule: Schedule::default(),
            constants: SolverConstants::default(),
            composite: CompositeMode::default(),
            max_dt: None,
        }
    }
}

impl PipelineSettings {
    /// Settings described by a validated configuration.
    pub fn from_config(config: &FluidConfig) -> Self {
        Self {
            schedule: Schedule::new(config.diffusion_iterations, config.pressure_iterations),
            constants: config.solver_constants(),
            composite: config.composite,
            max_dt: config.max_dt,
        }
    }
}

/// Converts wall-clock instants into frame deltas.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    /// Clock with no previous tick.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the previous tick; zero on the first.
    pub fn tick(&mut self, now: Instant) -> Duration {
        let delta = self
            .last
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last = Some(now);
        delta
    }
}

/// A solver backend, its input source and the per-frame state.
pub struct FluidPipeline<B: FluidBackend> {
    backend: B,
    input: Box<dyn InputSource>,
    settings: PipelineSettings,
    frame: FrameState,
    state: PipelineState,
    dropped_frames: u64,
}

impl<B: FluidBackend> FluidPipeline<B> {
    /// Wrap `backend` without running setup.
    pub fn uninitialized(backend: B, settings: PipelineSettings, input: Box<dyn InputSource>) -> Self {
        let frame = FrameState::new(backend.resolution());
        Self {
            backend,
            input,
            settings,
            frame,
            state: PipelineState::Uninitialized,
            dropped_frames: 0,
        }
    }

    /// Wrap `backend` and run setup.
    pub fn new(
        backend: B,
        settings: PipelineSettings,
        input: Box<dyn InputSource>,
    ) -> Result<Self, PipelineError> {
        let mut pipeline = Self::uninitialized(backend, settings, input);
        pipeline.initialize()?;
        Ok(pipeline)
    }

    /// Compile programs and allocate fields. On failure the pipeline returns
    /// to `Uninitialized`.
    pub fn initialize(&mut self) -> Result<(), PipelineError> {
        let result = self.run_setup();
        if result.is_err() {
            self.state = PipelineState::Uninitialized;
        }
        result
    }

    fn run_setup(&mut self) -> Result<(), PipelineError> {
        let size = self.backend.resolution();
        tracing::info!(
            "Initializing {} pipeline at {}x{}",
            self.backend.name(),
            size.width,
            size.height
        );
        self.backend.compile_programs()?;
        self.state = PipelineState::ShadersLoaded;
        self.backend.allocate_fields()?;
        self.state = PipelineState::FieldsAllocated;
        tracing::debug!("Fields allocated for {} backend", self.backend.name());
        self.state = PipelineState::Ready;
        tracing::info!(
            "Pipeline ready: {} passes per frame",
            self.settings.schedule.len()
        );
        Ok(())
    }

    /// Advance by `delta` and run one frame.
    ///
    /// Frame state (counter, time step, pointer) always advances. When the
    /// backend reports its programs are not ready the frame is dropped
    /// without touching any field.
    pub fn update(&mut self, delta: Duration) -> Result<FrameOutcome, PipelineError> {
        if self.state != PipelineState::Ready {
            return Err(PipelineError::NotInitialized);
        }

        let mut dt = delta.as_secs_f32();
        if let Some(max_dt) = self.settings.max_dt {
            dt = dt.min(max_dt);
        }
        let resolution = self.frame.resolution;
        let pointer = self.input.sample(self.frame.frame.wrapping_add(1), dt, resolution);
        self.frame.advance(dt, pointer);
        let frame = self.frame.frame;

        if !self.backend.programs_ready() {
            self.dropped_frames += 1;
            tracing::debug!("Frame {frame} dropped: programs not ready");
            return Ok(FrameOutcome::Dropped { frame });
        }

        let result = self.run_schedule();
        self.state = PipelineState::Ready;
        result?;
        Ok(FrameOutcome::Completed { frame })
    }

    fn run_schedule(&mut self) -> Result<(), PipelineError> {
        let params = StageKind::ALL.map(|kind| {
            StageParams::for_stage(
                kind,
                &self.frame,
                &self.settings.constants,
                self.settings.composite,
            )
        });
        for &kind in self.settings.schedule.passes() {
            self.state = PipelineState::Running(kind);
            self.backend.run_pass(kind, &params[kind.index()])?;
        }
        self.backend.end_frame()?;
        Ok(())
    }

    /// Composite output of the last completed frame.
    pub fn final_composite(&mut self) -> Result<Field, PipelineError> {
        Ok(self.backend.read_field(FieldSlot::Composite)?)
    }

    /// Committed value of any field.
    pub fn read_field(&mut self, slot: FieldSlot) -> Result<Field, PipelineError> {
        Ok(self.backend.read_field(slot)?)
    }

    /// Overwrite a field between frames.
    pub fn write_field(&mut self, slot: FieldSlot, field: &Field) -> Result<(), PipelineError> {
        Ok(self.backend.write_field(slot, field)?)
    }

    /// Clear every field and restart the frame counter.
    pub fn reset(&mut self) -> Result<(), PipelineError> {
        self.backend.reset()?;
        self.frame = FrameState::new(self.frame.resolution);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Uniform state of the most recent frame.
    pub fn frame_state(&self) -> &FrameState {
        &self.frame
    }

    /// Frames skipped because the backend was not ready.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// The solver backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the solver backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Pipeline tunables.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_first_tick_is_zero() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        assert_eq!(clock.tick(t0), Duration::ZERO);
        let t1 = t0 + Duration::from_millis(16);
        assert_eq!(clock.tick(t1), Duration::from_millis(16));
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now() + Duration::from_secs(1);
        clock.tick(t0);
        assert_eq!(clock.tick(t0 - Duration::from_millis(5)), Duration::ZERO);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = FluidConfig::new("t", 8, 8);
        config.diffusion_iterations = 5;
        config.pressure_iterations = 7;
        config.max_dt = Some(0.05);
        config.viscosity = 0.25;
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.schedule.diffusion_iterations(), 5);
        assert_eq!(settings.schedule.pressure_iterations(), 7);
        assert_eq!(settings.max_dt, Some(0.05));
        assert_eq!(settings.constants.viscosity, 0.25);
    }
}
