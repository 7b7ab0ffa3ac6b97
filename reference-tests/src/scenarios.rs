//! The reference scenario catalogue.

use std::path::{Path, PathBuf};

use glam::Vec2;
use stam_kernel::{FieldSize, PointerSample};
use stam_orchestrator::{BackendType, FluidConfig, PipelineError};

use crate::analytical;
use crate::{
    DecayCheck, DivergenceCheck, DyeCheck, ExpectedResult, QuiescenceCheck, ReferenceTest,
    ScenarioInput, FRAME_TIME,
};

/// Resolve a path relative to the workspace root (one level up from this crate)
pub fn project_path(relative: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(manifest_dir).join(relative)
}

fn config(name: &str, n: u32, backend: BackendType) -> FluidConfig {
    FluidConfig {
        backend,
        ..FluidConfig::new(name, n, n)
    }
}

/// No pointer input: velocity must stay exactly zero.
pub fn quiescent_fluid(backend: BackendType) -> ReferenceTest {
    ReferenceTest {
        name: "Quiescent Fluid".to_string(),
        config: config("quiescent", 32, backend),
        input: ScenarioInput::Keyframes(Vec::new()),
        initial_velocity: None,
        frames: 30,
        frame_time: FRAME_TIME,
        expected: ExpectedResult {
            quiescence: Some(QuiescenceCheck { max_speed: 0.0 }),
            finite: true,
            ..Default::default()
        },
    }
}

/// One rightward drag at the grid centre, then 100 frames released. The
/// centre speed must fall below 5% of its first-frame value.
pub fn impulse_decay(backend: BackendType) -> ReferenceTest {
    let n = 64;
    let centre = Vec2::splat(n as f32 * 0.5);
    ReferenceTest {
        name: "Impulse Decay".to_string(),
        config: config("impulse-decay", n, backend),
        input: ScenarioInput::Keyframes(vec![PointerSample {
            position: centre,
            motion: Vec2::new(1.0, 0.0),
            active: true,
        }]),
        initial_velocity: None,
        frames: 101,
        frame_time: FRAME_TIME,
        expected: ExpectedResult {
            decay: Some(DecayCheck {
                cell: (n as usize / 2, n as usize / 2),
                max_ratio: 0.05,
            }),
            finite: true,
            ..Default::default()
        },
    }
}

/// Start from a vortex plus a curl-free field and let the solver run
/// unforced. Divergence must drop to half its starting RMS.
pub fn helmholtz_projection(backend: BackendType) -> Result<ReferenceTest, PipelineError> {
    let n = 32;
    let size = FieldSize::square(n)?;
    Ok(ReferenceTest {
        name: "Helmholtz Projection".to_string(),
        config: config("helmholtz", n, backend),
        input: ScenarioInput::Keyframes(Vec::new()),
        initial_velocity: Some(analytical::helmholtz_field(size, 1.0, 1.0)),
        frames: 60,
        frame_time: FRAME_TIME,
        expected: ExpectedResult {
            divergence: Some(DivergenceCheck { max_ratio: 0.5 }),
            finite: true,
            ..Default::default()
        },
    })
}

/// The shipped orbit configuration at reduced resolution: the scripted
/// pointer must leave dye in the composite.
pub fn orbiting_stirrer(backend: BackendType) -> Result<ReferenceTest, PipelineError> {
    let path = project_path("configs/orbit.json");
    let mut config = FluidConfig::load(&path.to_string_lossy())?;
    config.resolution = [64, 64];
    config.backend = backend;
    Ok(ReferenceTest {
        name: "Orbiting Stirrer".to_string(),
        config,
        input: ScenarioInput::Configured,
        initial_velocity: None,
        frames: 60,
        frame_time: FRAME_TIME,
        expected: ExpectedResult {
            dye: Some(DyeCheck { min_peak: 0.01 }),
            finite: true,
            ..Default::default()
        },
    })
}

/// Every scenario for `backend`.
pub fn all(backend: BackendType) -> Result<Vec<ReferenceTest>, PipelineError> {
    Ok(vec![
        quiescent_fluid(backend),
        impulse_decay(backend),
        helmholtz_projection(backend)?,
        orbiting_stirrer(backend)?,
    ])
}
