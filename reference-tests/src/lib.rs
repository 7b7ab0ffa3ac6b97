//! Reference scenario framework for stable-fluids validation
//!
//! This crate drives complete pipelines through scripted scenarios and
//! checks the resulting fields against physical expectations: a fluid at
//! rest stays at rest, impulses decay, projection removes divergence and the
//! composite shows the injected dye.

pub mod analytical;
pub mod scenarios;

#[cfg(test)]
mod tests;

#[cfg(all(test, feature = "gpu"))]
mod gpu_tests;

use std::time::Duration;

use glam::{Vec4, Vec4Swizzles};
use stam_kernel::{
    divergence_metrics, Field, FieldMetrics, FieldSlot, FluidBackend, PointerSample,
};
use stam_orchestrator::{
    create_pipeline, create_pipeline_with_input, DynBackend, FluidConfig, FluidPipeline,
    FrameOutcome, PipelineError, ScriptedInput,
};

/// Frame time of a 60 Hz display.
pub const FRAME_TIME: Duration = Duration::from_micros(16_667);

/// Expected result criteria for a reference scenario
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Velocity must stay (near) zero everywhere
    pub quiescence: Option<QuiescenceCheck>,
    /// Speed at a sample cell must decay after the first frame
    pub decay: Option<DecayCheck>,
    /// Divergence must shrink relative to the starting state
    pub divergence: Option<DivergenceCheck>,
    /// The composite must show dye
    pub dye: Option<DyeCheck>,
    /// Every field must stay finite
    pub finite: bool,
}

/// Check that the velocity field never leaves rest
#[derive(Debug, Clone)]
pub struct QuiescenceCheck {
    /// Largest allowed speed at any cell, any frame
    pub max_speed: f32,
}

/// Check that speed at a sample cell decays
#[derive(Debug, Clone)]
pub struct DecayCheck {
    /// Sample cell (column, row)
    pub cell: (usize, usize),
    /// Largest allowed final speed as a fraction of the speed after frame 1
    pub max_ratio: f32,
}

/// Check that projection removes divergence over the run
#[derive(Debug, Clone)]
pub struct DivergenceCheck {
    /// Largest allowed final interior divergence RMS as a fraction of the
    /// starting value
    pub max_ratio: f32,
}

/// Check the composite for injected dye
#[derive(Debug, Clone)]
pub struct DyeCheck {
    /// Smallest acceptable peak colour magnitude
    pub min_peak: f32,
}

/// Where a scenario's pointer input comes from
#[derive(Debug, Clone)]
pub enum ScenarioInput {
    /// The input source named in the configuration
    Configured,
    /// A fixed pointer script, one sample per frame
    Keyframes(Vec<PointerSample>),
}

/// Field statistics at the end of a scenario
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalMetrics {
    /// Largest speed over the grid
    pub max_speed: f32,
    /// Interior divergence RMS of the projected velocity
    pub divergence_rms: f32,
    /// Largest composite colour magnitude
    pub max_colour: f32,
}

/// Result of running a reference scenario
#[derive(Debug)]
pub struct TestResult {
    /// Scenario name
    pub name: String,
    /// Backend the scenario ran on
    pub backend: &'static str,
    /// Whether every check passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Final field statistics
    pub metrics: FinalMetrics,
    /// Frames completed
    pub frames: u32,
    /// Frames dropped by the pipeline
    pub dropped: u64,
    /// Simulated time (seconds)
    pub sim_time: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Detail message
    pub message: Option<String>,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: String) -> Self {
        Self {
            name: name.to_string(),
            passed,
            message: Some(message),
        }
    }
}

/// A reference scenario
pub struct ReferenceTest {
    /// Scenario name
    pub name: String,
    /// Pipeline configuration
    pub config: FluidConfig,
    /// Pointer input
    pub input: ScenarioInput,
    /// Velocity written before the first frame
    pub initial_velocity: Option<Field>,
    /// Number of frames to run
    pub frames: u32,
    /// Wall-clock time per frame
    pub frame_time: Duration,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

/// Values observed while the scenario runs
#[derive(Default)]
struct Observations {
    max_speed_seen: f32,
    sampled_after_first: Option<f32>,
    initial_divergence: Option<f32>,
    non_finite_frame: Option<u32>,
}

impl ReferenceTest {
    fn build_pipeline(&self) -> Result<FluidPipeline<DynBackend>, PipelineError> {
        match &self.input {
            ScenarioInput::Configured => create_pipeline(&self.config).map(|(pipeline, _)| pipeline),
            ScenarioInput::Keyframes(samples) => create_pipeline_with_input(
                &self.config,
                Box::new(ScriptedInput::keyframes(samples.clone())),
            ),
        }
    }

    /// Run the scenario and return results
    pub fn run(&self) -> Result<TestResult, PipelineError> {
        tracing::info!("Running reference scenario: {}", self.name);

        let mut pipeline = self.build_pipeline()?;
        let backend = pipeline.backend().name();
        tracing::info!(
            "Initialized {} backend at {}x{}",
            backend,
            self.config.resolution[0],
            self.config.resolution[1]
        );

        let mut seen = Observations::default();
        if let Some(velocity) = &self.initial_velocity {
            pipeline.write_field(FieldSlot::Velocity, velocity)?;
            seen.initial_divergence = Some(divergence_metrics(velocity).rms);
        }

        let mut completed = 0u32;
        let mut sim_time = 0.0_f64;
        for step in 0..self.frames {
            let outcome = pipeline.update(self.frame_time)?;
            sim_time += pipeline.frame_state().dt as f64;
            if let FrameOutcome::Completed { frame } = outcome {
                completed += 1;
                self.observe(&mut pipeline, frame, &mut seen)?;
            }

            if (step + 1) % (self.frames / 10).max(1) == 0 {
                let progress = ((step + 1) as f32 / self.frames as f32) * 100.0;
                tracing::info!("Progress: {:.0}% ({}/{})", progress, step + 1, self.frames);
            }
        }
        tracing::info!("Scenario complete: {} frames, {:.3}s simulated", completed, sim_time);

        let velocity = pipeline.read_field(FieldSlot::Velocity)?;
        let composite = pipeline.final_composite()?;
        let metrics = FinalMetrics {
            max_speed: FieldMetrics::speed(&velocity).max_abs,
            divergence_rms: divergence_metrics(&velocity).rms,
            max_colour: colour_peak(&composite),
        };

        let mut checks = Vec::new();
        if let Some(check) = &self.expected.quiescence {
            checks.push(validate_quiescence(&seen, check));
        }
        if let Some(check) = &self.expected.decay {
            checks.push(validate_decay(&velocity, &seen, check));
        }
        if let Some(check) = &self.expected.divergence {
            checks.push(validate_divergence(&metrics, &seen, check));
        }
        if let Some(check) = &self.expected.dye {
            checks.push(validate_dye(&metrics, check));
        }
        if self.expected.finite {
            checks.push(validate_finite(&seen));
        }
        let passed = completed == self.frames && checks.iter().all(|c| c.passed);

        Ok(TestResult {
            name: self.name.clone(),
            backend,
            passed,
            checks,
            metrics,
            frames: completed,
            dropped: pipeline.dropped_frames(),
            sim_time,
        })
    }

    fn observe(
        &self,
        pipeline: &mut FluidPipeline<DynBackend>,
        frame: u32,
        seen: &mut Observations,
    ) -> Result<(), PipelineError> {
        let velocity = pipeline.read_field(FieldSlot::Velocity)?;
        seen.max_speed_seen = seen.max_speed_seen.max(FieldMetrics::speed(&velocity).max_abs);

        if seen.sampled_after_first.is_none() {
            if let Some(decay) = &self.expected.decay {
                let (i, j) = decay.cell;
                seen.sampled_after_first = Some(velocity.get(i, j).xy().length());
            }
        }
        if seen.initial_divergence.is_none() {
            let scratch = pipeline.read_field(FieldSlot::Scratch)?;
            seen.initial_divergence = Some(FieldMetrics::interior_x(&scratch).rms);
        }

        if self.expected.finite && seen.non_finite_frame.is_none() {
            for slot in [FieldSlot::Velocity, FieldSlot::Pressure, FieldSlot::Quantity] {
                let field = pipeline.read_field(slot)?;
                if !field.texels().iter().all(|t| t.is_finite()) {
                    seen.non_finite_frame = Some(frame);
                    break;
                }
            }
        }
        Ok(())
    }
}

fn colour_peak(composite: &Field) -> f32 {
    FieldMetrics::measure(composite, |_, _| true, |t: Vec4| t.xyz().length()).max_abs
}

/// Validate that the velocity stayed at rest
fn validate_quiescence(seen: &Observations, check: &QuiescenceCheck) -> CheckResult {
    CheckResult::new(
        "Quiescence",
        seen.max_speed_seen <= check.max_speed,
        format!(
            "Max speed seen: {:.3e} (limit: {:.3e})",
            seen.max_speed_seen, check.max_speed
        ),
    )
}

/// Validate decay at the sample cell
fn validate_decay(velocity: &Field, seen: &Observations, check: &DecayCheck) -> CheckResult {
    let Some(first) = seen.sampled_after_first else {
        return CheckResult::new("Decay", false, "No frame completed".to_string());
    };
    if first <= 0.0 {
        return CheckResult::new("Decay", false, "No velocity at sample cell after frame 1".to_string());
    }
    let (i, j) = check.cell;
    let last = velocity.get(i, j).xy().length();
    let ratio = last / first;
    CheckResult::new(
        "Decay",
        ratio <= check.max_ratio,
        format!(
            "Cell speed {:.3e} -> {:.3e} (ratio: {:.3}, limit: {:.3})",
            first, last, ratio, check.max_ratio
        ),
    )
}

/// Validate that divergence shrank over the run
fn validate_divergence(
    metrics: &FinalMetrics,
    seen: &Observations,
    check: &DivergenceCheck,
) -> CheckResult {
    let Some(initial) = seen.initial_divergence else {
        return CheckResult::new("Divergence", false, "No starting divergence".to_string());
    };
    let passed = metrics.divergence_rms <= check.max_ratio * initial;
    CheckResult::new(
        "Divergence",
        passed,
        format!(
            "RMS {:.3e} -> {:.3e} (limit: {:.0}% of start)",
            initial,
            metrics.divergence_rms,
            check.max_ratio * 100.0
        ),
    )
}

/// Validate that the composite shows dye
fn validate_dye(metrics: &FinalMetrics, check: &DyeCheck) -> CheckResult {
    CheckResult::new(
        "Dye",
        metrics.max_colour >= check.min_peak,
        format!(
            "Peak colour: {:.3} (minimum: {:.3})",
            metrics.max_colour, check.min_peak
        ),
    )
}

/// Validate that no field went non-finite
fn validate_finite(seen: &Observations) -> CheckResult {
    match seen.non_finite_frame {
        None => CheckResult {
            name: "Finite".to_string(),
            passed: true,
            message: None,
        },
        Some(frame) => CheckResult::new("Finite", false, format!("Non-finite texel at frame {frame}")),
    }
}

impl TestResult {
    /// Print a summary of the scenario result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Scenario: {} ({})", self.name, self.backend);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Frames: {} ({} dropped)", self.frames, self.dropped);
        println!("Simulated time: {:.3} s", self.sim_time);
        println!("\nFinal Metrics:");
        println!("  Max speed: {:.3e}", self.metrics.max_speed);
        println!("  Divergence RMS: {:.3e}", self.metrics.divergence_rms);
        println!("  Peak colour: {:.3}", self.metrics.max_colour);
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}
