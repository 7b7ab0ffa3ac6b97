//! Closed-form velocity and dye fields for reference scenarios.
//!
//! All fields live on the unit square in uv coordinates and vanish on its
//! boundary, so they agree with the solver's zero exterior.

use std::f32::consts::PI;

use glam::{Vec2, Vec4};
use stam_kernel::{Field, FieldSize};

/// Gradient of `phi = A sin^2(pi x) sin^2(pi y)`.
///
/// ```text
/// u = A pi sin(2 pi x) sin^2(pi y)
/// v = A pi sin^2(pi x) sin(2 pi y)
/// ```
///
/// Curl-free, so projection should remove it entirely.
pub fn potential_velocity(uv: Vec2, amplitude: f32) -> Vec2 {
    let (x, y) = (uv.x, uv.y);
    amplitude
        * PI
        * Vec2::new(
            (2.0 * PI * x).sin() * (PI * y).sin().powi(2),
            (PI * x).sin().powi(2) * (2.0 * PI * y).sin(),
        )
}

/// Rotated gradient of the stream function `psi = A sin^2(pi x) sin^2(pi y)`.
///
/// ```text
/// u =  d(psi)/dy
/// v = -d(psi)/dx
/// ```
///
/// Divergence-free: a single counter-rotating vortex filling the square.
pub fn solenoidal_velocity(uv: Vec2, amplitude: f32) -> Vec2 {
    let g = potential_velocity(uv, amplitude);
    Vec2::new(g.y, -g.x)
}

/// Velocity field whose Helmholtz parts are `potential` and `solenoidal`
/// scaled copies of the fields above.
pub fn helmholtz_field(size: FieldSize, potential: f32, solenoidal: f32) -> Field {
    Field::from_fn(size, |uv| {
        (potential_velocity(uv, potential) + solenoidal_velocity(uv, solenoidal))
            .extend(0.0)
            .extend(0.0)
    })
}

/// Isotropic Gaussian dye blob of standard deviation `sigma` (uv units).
pub fn gaussian_dye(size: FieldSize, centre: Vec2, sigma: f32) -> Field {
    let denom = 2.0 * sigma * sigma;
    Field::from_fn(size, |uv| {
        let g = (-uv.distance_squared(centre) / denom).exp();
        Vec4::new(g, g, g, 1.0)
    })
}

/// RMS difference of the velocity channels of `field` against `reference`.
pub fn velocity_rms_error(field: &Field, reference: impl Fn(Vec2) -> Vec2) -> f32 {
    let size = field.size();
    let mut sum_sq = 0.0f64;
    for (i, j, texel) in field.iter() {
        let expected = reference(size.texel_center(i, j));
        let d = (texel.truncate().truncate() - expected).length() as f64;
        sum_sq += d * d;
    }
    (sum_sq / size.texel_count() as f64).sqrt() as f32
}
