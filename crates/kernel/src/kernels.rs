//! Per-texel stage programs.
//!
//! These are the CPU counterparts of the WGSL fragment programs in
//! [`crate::gpu`] and evaluate one output texel at normalized coordinate `uv`.
//! All neighbour reads go through [`Field::sample`] so that out-of-bounds taps
//! see the `(0, 0, 0, 1)` border.

use glam::{Vec2, Vec4, Vec4Swizzles};

use crate::field::Field;
use crate::uniforms::{CompositeMode, StageParams};

/// Four-neighbour taps of `field` around `uv`: left, right, bottom, top.
#[inline]
fn neighbours(field: &Field, uv: Vec2, texel: Vec2) -> [Vec4; 4] {
    [
        field.sample(uv - Vec2::new(texel.x, 0.0)),
        field.sample(uv + Vec2::new(texel.x, 0.0)),
        field.sample(uv - Vec2::new(0.0, texel.y)),
        field.sample(uv + Vec2::new(0.0, texel.y)),
    ]
}

/// Semi-Lagrangian back-trace of `source` along `velocity`, averaged over the
/// four neighbours of the departure point.
pub fn advect(uv: Vec2, velocity: &Field, source: &Field, params: &StageParams) -> Vec4 {
    let departure = uv - params.dt * params.aspect() * velocity.sample(uv).xy();
    let [l, r, b, t] = neighbours(source, departure, params.texel());
    l.lerp(r, 0.5).lerp(b.lerp(t, 0.5), 0.5)
}

/// Colour deposited by the pointer around its position.
pub fn splat(uv: Vec2, params: &StageParams) -> Vec4 {
    if !params.pointer_is_active() {
        return Vec4::ZERO;
    }
    let origin = params.pointer_position / params.resolution;
    let dist = uv.distance(origin);
    if dist >= params.splat_radius {
        return Vec4::ZERO;
    }
    let a = params.splat_falloff;
    let value = a / (dist + a) - 0.5;
    let f = params.frame as f32;
    Vec4::new(
        value * (f / 200.0).cos(),
        value * (f / 100.0).sin(),
        value * (f / 300.0).sin(),
        1.0,
    )
    .abs()
        * params.splat_gain
}

/// Impulse contributed by the pointer at `uv`. The distance to the pointer is
/// floored at half a texel.
pub fn pointer_force(uv: Vec2, params: &StageParams) -> Vec2 {
    if !params.pointer_is_active() {
        return Vec2::ZERO;
    }
    let origin = params.pointer_position / params.resolution;
    let impulse = params.pointer_motion / params.resolution * params.force_multiplier;
    let dist = uv.distance(origin).max(0.5 * params.texel().min_element());
    impulse / dist
}

/// One Jacobi relaxation step: `(xL + xR + xB + xT + alpha * bC) * rbeta`.
pub fn jacobi(uv: Vec2, x: &Field, b: &Field, alpha: f32, rbeta: f32, texel: Vec2) -> Vec4 {
    let [l, r, bottom, top] = neighbours(x, uv, texel);
    (l + r + bottom + top + alpha * b.sample(uv)) * rbeta
}

/// Central-difference divergence, replicated into every channel.
pub fn divergence(uv: Vec2, velocity: &Field, params: &StageParams) -> Vec4 {
    let [l, r, b, t] = neighbours(velocity, uv, params.texel());
    Vec4::splat(params.aspect() * 0.5 * ((r.x - l.x) + (t.y - b.y)))
}

/// Velocity minus the central-difference pressure gradient.
pub fn subtract_gradient(uv: Vec2, pressure: &Field, velocity: &Field, params: &StageParams) -> Vec4 {
    let [l, r, b, t] = neighbours(pressure, uv, params.texel());
    let scale = params.aspect() * 0.5;
    let mut w = velocity.sample(uv);
    w.x -= scale * (r.x - l.x);
    w.y -= scale * (t.x - b.x);
    w
}

/// Display colour for the configured composite mode.
pub fn composite(
    uv: Vec2,
    velocity: &Field,
    scratch: &Field,
    pressure: &Field,
    quantity: &Field,
    params: &StageParams,
) -> Vec4 {
    match CompositeMode::from_raw(params.composite_mode) {
        CompositeMode::Quantity => quantity.sample(uv).xyz().extend(1.0),
        CompositeMode::Velocity => {
            let v = velocity.sample(uv);
            Vec4::new(0.5 + 0.5 * v.x, 0.5 + 0.5 * v.y, 0.5, 1.0)
        }
        CompositeMode::Pressure => signed(pressure.sample(uv).x),
        CompositeMode::Divergence => signed(scratch.sample(uv).x),
    }
}

fn signed(value: f32) -> Vec4 {
    Vec4::new(value.max(0.0), (-value).max(0.0), 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSize;
    use crate::uniforms::{FrameState, PointerSample, SolverConstants};
    use crate::stage::StageKind;

    fn params(kind: StageKind, pointer: PointerSample) -> StageParams {
        let mut frame = FrameState::new(FieldSize::square(16).unwrap());
        frame.advance(1.0 / 60.0, pointer);
        StageParams::for_stage(kind, &frame, &SolverConstants::default(), CompositeMode::Quantity)
    }

    #[test]
    fn advect_with_zero_velocity_averages_neighbours() {
        let size = FieldSize::square(16).unwrap();
        let velocity = Field::filled(size, Vec4::ZERO);
        let source = Field::filled(size, Vec4::splat(2.0));
        let p = params(StageKind::AdvectQuantity, PointerSample::default());
        let out = advect(size.texel_center(8, 8), &velocity, &source, &p);
        assert_eq!(out, Vec4::splat(2.0));
    }

    #[test]
    fn inactive_pointer_contributes_nothing() {
        let p = params(
            StageKind::Force,
            PointerSample {
                position: Vec2::new(8.0, 8.0),
                motion: Vec2::new(3.0, 0.0),
                active: false,
            },
        );
        assert_eq!(pointer_force(Vec2::splat(0.5), &p), Vec2::ZERO);
        assert_eq!(splat(Vec2::splat(0.5), &p), Vec4::ZERO);
    }

    #[test]
    fn force_points_along_motion_and_is_bounded() {
        let p = params(
            StageKind::Force,
            PointerSample {
                position: Vec2::new(8.0, 8.0),
                motion: Vec2::new(2.0, 0.0),
                active: true,
            },
        );
        let at_pointer = pointer_force(Vec2::splat(0.5), &p);
        assert!(at_pointer.is_finite());
        assert!(at_pointer.x > 0.0);
        assert_eq!(at_pointer.y, 0.0);
        let far = pointer_force(Vec2::new(0.9, 0.9), &p);
        assert!(far.x < at_pointer.x);
    }

    #[test]
    fn splat_limited_to_radius() {
        let p = params(
            StageKind::AdvectQuantity,
            PointerSample {
                position: Vec2::new(8.0, 8.0),
                motion: Vec2::ZERO,
                active: true,
            },
        );
        let near = splat(Vec2::splat(0.5), &p);
        assert!(near.w > 0.0);
        assert_eq!(splat(Vec2::new(0.5, 0.9), &p), Vec4::ZERO);
    }

    #[test]
    fn divergence_of_linear_flow() {
        let size = FieldSize::square(16).unwrap();
        // u = x in uv units: each texel step adds 1/16.
        let velocity = Field::from_fn(size, |uv| Vec4::new(uv.x, 0.0, 0.0, 0.0));
        let p = params(StageKind::Divergence, PointerSample::default());
        let d = divergence(size.texel_center(5, 5), &velocity, &p);
        assert!((d.x - 1.0 / 16.0).abs() < 1e-6);
    }

    #[test]
    fn gradient_of_constant_pressure_is_zero_inside() {
        let size = FieldSize::square(16).unwrap();
        let pressure = Field::filled(size, Vec4::new(3.0, 3.0, 3.0, 3.0));
        let velocity = Field::filled(size, Vec4::new(0.25, -0.5, 0.0, 0.0));
        let p = params(StageKind::Gradient, PointerSample::default());
        let w = subtract_gradient(size.texel_center(7, 7), &pressure, &velocity, &p);
        assert_eq!(w.xy(), Vec2::new(0.25, -0.5));
    }

    #[test]
    fn composite_quantity_is_opaque() {
        let size = FieldSize::square(4).unwrap();
        let q = Field::filled(size, Vec4::new(0.1, 0.2, 0.3, 0.0));
        let other = Field::new(size);
        let p = params(StageKind::Composite, PointerSample::default());
        let c = composite(Vec2::splat(0.5), &other, &other, &other, &q, &p);
        assert_eq!(c, Vec4::new(0.1, 0.2, 0.3, 1.0));
    }
}
