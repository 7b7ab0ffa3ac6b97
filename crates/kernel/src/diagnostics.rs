//! Field measurements used by tests, benches and the reference scenarios.

use glam::Vec4;

use crate::field::{Field, FieldSize};
use crate::kernels;
use crate::pass::execute_pass;
use crate::stage::StageKind;
use crate::uniforms::{CompositeMode, FrameState, SolverConstants, StageParams};

/// Summary statistics of one scalar extracted from a field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldMetrics {
    /// Largest absolute value.
    pub max_abs: f32,
    /// Root mean square.
    pub rms: f32,
    /// Arithmetic mean.
    pub mean: f32,
    /// Cells measured.
    pub count: usize,
}

impl FieldMetrics {
    /// Measure `value(texel)` over every cell accepted by `include(i, j)`.
    pub fn measure(
        field: &Field,
        include: impl Fn(usize, usize) -> bool,
        value: impl Fn(Vec4) -> f32,
    ) -> Self {
        let mut max_abs = 0.0f32;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        for (i, j, texel) in field.iter() {
            if !include(i, j) {
                continue;
            }
            let v = value(texel);
            max_abs = max_abs.max(v.abs());
            sum += v as f64;
            sum_sq += (v as f64) * (v as f64);
            count += 1;
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            max_abs,
            rms: (sum_sq / count as f64).sqrt() as f32,
            mean: (sum / count as f64) as f32,
            count,
        }
    }

    /// Channel `x` over cells at least one texel from the boundary.
    pub fn interior_x(field: &Field) -> Self {
        let size = field.size();
        Self::measure(field, |i, j| size.is_interior(i, j), |t| t.x)
    }

    /// Velocity magnitude over every cell.
    pub fn speed(velocity: &Field) -> Self {
        Self::measure(velocity, |_, _| true, |t| t.truncate().truncate().length())
    }
}

fn neutral_params(size: FieldSize, kind: StageKind) -> StageParams {
    StageParams::for_stage(
        kind,
        &FrameState::new(size),
        &SolverConstants::default(),
        CompositeMode::Quantity,
    )
}

/// Divergence of `velocity` as the divergence stage computes it.
pub fn divergence_field(velocity: &Field) -> Field {
    let params = neutral_params(velocity.size(), StageKind::Divergence);
    let mut out = Field::new(velocity.size());
    execute_pass(&mut out, |uv| kernels::divergence(uv, velocity, &params));
    out
}

/// Interior divergence statistics of `velocity`.
pub fn divergence_metrics(velocity: &Field) -> FieldMetrics {
    FieldMetrics::interior_x(&divergence_field(velocity))
}

/// L2 norm of the discrete Poisson residual `L p - d` over every cell, where
/// `L` is the five-point Laplacian with zero exterior pressure.
pub fn poisson_residual(pressure: &Field, divergence: &Field) -> f32 {
    let size = pressure.size();
    let texel = size.texel();
    let mut sum_sq = 0.0f64;
    for j in 0..size.height as usize {
        for i in 0..size.width as usize {
            let uv = size.texel_center(i, j);
            let p = |du: f32, dv: f32| pressure.sample(uv + glam::Vec2::new(du, dv)).x;
            let laplacian =
                p(-texel.x, 0.0) + p(texel.x, 0.0) + p(0.0, -texel.y) + p(0.0, texel.y) - 4.0 * p(0.0, 0.0);
            let r = (laplacian - divergence.get(i, j).x) as f64;
            sum_sq += r * r;
        }
    }
    sum_sq.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_flow_is_divergence_free_inside() {
        let size = FieldSize::square(16).unwrap();
        let v = Field::filled(size, Vec4::new(0.3, -0.2, 0.0, 0.0));
        let m = divergence_metrics(&v);
        assert_eq!(m.max_abs, 0.0);
        assert_eq!(m.count, 14 * 14);
    }

    #[test]
    fn zero_pressure_residual_is_divergence_norm() {
        let size = FieldSize::square(4).unwrap();
        let p = Field::filled(size, Vec4::ZERO);
        let d = Field::filled(size, Vec4::splat(0.5));
        let r = poisson_residual(&p, &d);
        assert!((r - (16.0f32 * 0.25).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn measure_respects_filter() {
        let size = FieldSize::square(3).unwrap();
        let mut f = Field::filled(size, Vec4::ZERO);
        f.set(1, 1, Vec4::new(-2.0, 0.0, 0.0, 0.0));
        let m = FieldMetrics::interior_x(&f);
        assert_eq!(m.count, 1);
        assert_eq!(m.max_abs, 2.0);
        assert_eq!(m.mean, -2.0);
    }
}
