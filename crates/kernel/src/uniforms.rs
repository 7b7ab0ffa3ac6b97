//! Per-frame state and the typed uniform block shared by all stage programs.
//!
//! [`StageParams`] is laid out exactly like the `StageParams` struct in the
//! WGSL programs (80 bytes, no implicit padding), so the CPU kernels and the
//! GPU path read identical values.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::field::FieldSize;
use crate::stage::StageKind;

// ---------------------------------------------------------------------------
// Frame state
// ---------------------------------------------------------------------------

/// Pointer reading for one frame, in grid-pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerSample {
    /// Position in pixels, origin at texel (0, 0).
    pub position: Vec2,
    /// Displacement since the previous frame, in pixels.
    pub motion: Vec2,
    /// Whether the pointer is pressed.
    pub active: bool,
}

/// Host-side state refreshed once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Grid resolution.
    pub resolution: FieldSize,
    /// Frames completed so far; the value seen by the stages of frame `n` is `n`.
    pub frame: u32,
    /// Frame time step in seconds.
    pub dt: f32,
    /// Current pointer reading.
    pub pointer: PointerSample,
}

impl FrameState {
    /// State before the first frame.
    pub fn new(resolution: FieldSize) -> Self {
        Self {
            resolution,
            frame: 0,
            dt: 0.0,
            pointer: PointerSample::default(),
        }
    }

    /// Advance to the next frame.
    pub fn advance(&mut self, dt: f32, pointer: PointerSample) {
        self.frame = self.frame.wrapping_add(1);
        self.dt = dt;
        self.pointer = pointer;
    }
}

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Physical and visual tuning constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConstants {
    /// Kinematic viscosity in uv^2/s.
    pub viscosity: f32,
    /// Scale applied to pointer motion before it becomes an impulse.
    pub force_multiplier: f32,
    /// Per-frame multiplicative damping of advected fields.
    pub decay: f32,
    /// Radius of the quantity splat in uv units.
    pub splat_radius: f32,
    /// Falloff constant of the splat profile.
    pub splat_falloff: f32,
    /// Gain applied to the splat colour.
    pub splat_gain: f32,
}

impl Default for SolverConstants {
    fn default() -> Self {
        Self {
            viscosity: 1.0,
            force_multiplier: 0.3,
            decay: 0.995,
            splat_radius: 0.15,
            splat_falloff: 0.12,
            splat_gain: 0.7,
        }
    }
}

/// What the composite stage writes to its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    /// The advected quantity, opaque.
    #[default]
    Quantity,
    /// Velocity mapped to red/green around mid grey.
    Velocity,
    /// Pressure sign split across red and green.
    Pressure,
    /// Divergence sign split across red and green.
    Divergence,
}

impl CompositeMode {
    /// Encoding carried in the uniform block.
    pub fn as_raw(self) -> u32 {
        match self {
            CompositeMode::Quantity => 0,
            CompositeMode::Velocity => 1,
            CompositeMode::Pressure => 2,
            CompositeMode::Divergence => 3,
        }
    }

    /// Inverse of [`CompositeMode::as_raw`]; unknown values fall back to `Quantity`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => CompositeMode::Velocity,
            2 => CompositeMode::Pressure,
            3 => CompositeMode::Divergence,
            _ => CompositeMode::Quantity,
        }
    }
}

// ---------------------------------------------------------------------------
// Uniform block
// ---------------------------------------------------------------------------

/// Uniform values consumed by a single stage invocation.
///
/// Must match `StageParams` in the WGSL header exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StageParams {
    /// Grid resolution in texels.
    pub resolution: Vec2,
    /// Pointer position in pixels.
    pub pointer_position: Vec2,
    /// Pointer motion in pixels.
    pub pointer_motion: Vec2,
    /// Frame counter.
    pub frame: u32,
    /// Time step in seconds.
    pub dt: f32,
    /// 1.0 while the pointer is pressed, else 0.0.
    pub pointer_active: f32,
    /// Jacobi weight of the right-hand side.
    pub alpha: f32,
    /// Jacobi normaliser; zero turns the diffusion stage into a copy.
    pub rbeta: f32,
    /// Multiplicative damping applied by the advection stages.
    pub decay: f32,
    /// Pointer force scale.
    pub force_multiplier: f32,
    /// Dye splat cut-off distance (uv).
    pub splat_radius: f32,
    /// Dye splat falloff length (uv).
    pub splat_falloff: f32,
    /// Dye splat intensity.
    pub splat_gain: f32,
    /// [`CompositeMode::as_raw`] value.
    pub composite_mode: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

/// Size of the uniform block in bytes.
pub const STAGE_PARAMS_SIZE: usize = std::mem::size_of::<StageParams>();

impl StageParams {
    /// Uniforms for `kind` during the frame described by `frame`.
    pub fn for_stage(
        kind: StageKind,
        frame: &FrameState,
        constants: &SolverConstants,
        composite: CompositeMode,
    ) -> Self {
        let resolution = frame.resolution.as_vec2();
        let (alpha, rbeta) = match kind {
            StageKind::Diffuse => diffusion_weights(resolution, constants.viscosity, frame.dt),
            StageKind::Pressure => PRESSURE_WEIGHTS,
            _ => (0.0, 0.0),
        };
        let decay = match kind {
            StageKind::AdvectVelocity | StageKind::AdvectQuantity => constants.decay,
            _ => 1.0,
        };
        Self {
            resolution,
            pointer_position: frame.pointer.position,
            pointer_motion: frame.pointer.motion,
            frame: frame.frame,
            dt: frame.dt,
            pointer_active: if frame.pointer.active { 1.0 } else { 0.0 },
            alpha,
            rbeta,
            decay,
            force_multiplier: constants.force_multiplier,
            splat_radius: constants.splat_radius,
            splat_falloff: constants.splat_falloff,
            splat_gain: constants.splat_gain,
            composite_mode: composite.as_raw(),
            _pad0: 0,
            _pad1: 0,
            _pad2: 0,
        }
    }

    /// Texel size in uv units.
    pub fn texel(&self) -> Vec2 {
        Vec2::ONE / self.resolution
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        self.resolution.x / self.resolution.y
    }

    /// Whether the pointer is pressed this frame.
    pub fn pointer_is_active(&self) -> bool {
        self.pointer_active != 0.0
    }
}

/// Jacobi weights of the pressure Poisson solve in texel units.
///
/// Not the `alpha = -dx^2` of the textbook formulation: divergence and
/// gradient both omit the `1/dx` factor, so the Poisson system they imply
/// has unit spacing and `alpha = -1`.
pub const PRESSURE_WEIGHTS: (f32, f32) = (-1.0, 0.25);

/// Jacobi weights for implicit viscous diffusion: `alpha = dx^2 / (nu * dt)`,
/// `rbeta = 1 / (4 + alpha)`. A non-positive `nu * dt` yields `rbeta = 0`,
/// which the diffusion program treats as a pass-through.
pub fn diffusion_weights(resolution: Vec2, viscosity: f32, dt: f32) -> (f32, f32) {
    let nu_dt = viscosity * dt;
    if nu_dt <= 0.0 || !nu_dt.is_finite() {
        return (0.0, 0.0);
    }
    let dx = 1.0 / resolution.x;
    let alpha = dx * dx / nu_dt;
    (alpha, 1.0 / (4.0 + alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(dt: f32) -> FrameState {
        let mut f = FrameState::new(FieldSize::square(64).unwrap());
        f.advance(dt, PointerSample::default());
        f
    }

    #[test]
    fn uniform_block_is_80_bytes() {
        assert_eq!(STAGE_PARAMS_SIZE, 80);
        assert_eq!(STAGE_PARAMS_SIZE % 16, 0);
    }

    #[test]
    fn pressure_uses_poisson_weights() {
        let p = StageParams::for_stage(
            StageKind::Pressure,
            &frame(1.0 / 60.0),
            &SolverConstants::default(),
            CompositeMode::Quantity,
        );
        assert_eq!(p.alpha, -1.0);
        assert_eq!(p.rbeta, 0.25);
        assert_eq!(p.decay, 1.0);
    }

    #[test]
    fn diffusion_weights_follow_viscosity() {
        let p = StageParams::for_stage(
            StageKind::Diffuse,
            &frame(1.0 / 60.0),
            &SolverConstants::default(),
            CompositeMode::Quantity,
        );
        let expected_alpha = (1.0f32 / 64.0).powi(2) * 60.0;
        assert!((p.alpha - expected_alpha).abs() < 1e-6);
        assert!((p.rbeta - 1.0 / (4.0 + expected_alpha)).abs() < 1e-6);
    }

    #[test]
    fn zero_dt_disables_diffusion() {
        assert_eq!(diffusion_weights(Vec2::splat(64.0), 1.0, 0.0), (0.0, 0.0));
        assert_eq!(diffusion_weights(Vec2::splat(64.0), 0.0, 0.016), (0.0, 0.0));
    }

    #[test]
    fn decay_only_on_advection() {
        let c = SolverConstants::default();
        let f = frame(0.016);
        for kind in StageKind::ALL {
            let p = StageParams::for_stage(kind, &f, &c, CompositeMode::Quantity);
            let advects = matches!(kind, StageKind::AdvectVelocity | StageKind::AdvectQuantity);
            assert_eq!(p.decay == c.decay, advects, "{kind:?}");
        }
    }

    #[test]
    fn composite_mode_raw_values() {
        for mode in [
            CompositeMode::Quantity,
            CompositeMode::Velocity,
            CompositeMode::Pressure,
            CompositeMode::Divergence,
        ] {
            assert_eq!(CompositeMode::from_raw(mode.as_raw()), mode);
        }
        assert_eq!(CompositeMode::from_raw(99), CompositeMode::Quantity);
    }

    #[test]
    fn frame_counter_advances() {
        let mut f = FrameState::new(FieldSize::square(8).unwrap());
        f.advance(0.1, PointerSample::default());
        f.advance(0.1, PointerSample::default());
        assert_eq!(f.frame, 2);
    }
}
