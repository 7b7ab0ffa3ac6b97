//! Three-dimensional fields stored as depth slices tiled along x.
//!
//! A `W x H x D` volume occupies a `(W * D) x H` [`Field`]; slice `k` covers the
//! horizontal strip `[k / D, (k + 1) / D)` of the atlas.

use glam::{Vec2, Vec3, Vec4};

use crate::error::KernelError;
use crate::field::{Field, FieldSize};

/// Outcome of a volume lookup. Out-of-bounds is reported explicitly rather
/// than through the border alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeSample {
    /// Voxel value.
    Inside(Vec4),
    /// `uvw` left the unit cube.
    OutOfBounds,
}

impl VolumeSample {
    /// Value, or the `(0, 0, 0, 1)` border for out-of-bounds lookups.
    pub fn or_border(self) -> Vec4 {
        match self {
            VolumeSample::Inside(v) => v,
            VolumeSample::OutOfBounds => crate::field::BORDER,
        }
    }
}

/// Dimensions of a tiled volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeLayout {
    /// Voxels along x (tile width).
    pub width: u32,
    /// Voxels along y (tile height).
    pub height: u32,
    /// Number of slices, laid out left to right.
    pub depth: u32,
}

impl VolumeLayout {
    /// Validate the dimensions; every axis must be non-zero and the atlas
    /// width `width * depth` must fit in a `u32`.
    pub fn new(width: u32, height: u32, depth: u32) -> Result<Self, KernelError> {
        if depth == 0 {
            return Err(KernelError::InvalidSize { width, height: depth });
        }
        FieldSize::new(width, height)?;
        if width.checked_mul(depth).is_none() {
            return Err(KernelError::InvalidSize { width, height: depth });
        }
        Ok(Self { width, height, depth })
    }

    /// Size of the backing 2D atlas.
    pub fn atlas_size(&self) -> FieldSize {
        FieldSize {
            width: self.width * self.depth,
            height: self.height,
        }
    }

    /// Atlas coordinate of volume coordinate `uvw`.
    pub fn tile_uv(&self, uvw: Vec3) -> Vec2 {
        let d = self.depth as f32;
        let slice = (uvw.z * d).floor().clamp(0.0, d - 1.0);
        Vec2::new((uvw.x + slice) / d, uvw.y)
    }

    /// Volume coordinate of the voxel corner addressed by atlas coordinate `uv`.
    pub fn voxel_uvw(&self, uv: Vec2) -> Vec3 {
        let w = self.width as f32;
        let h = self.height as f32;
        let d = self.depth as f32;
        let y = (uv.y * h).floor() / h;
        let column = (w * d * uv.x).floor() / w;
        let x = (column.fract() * w).floor() / w;
        let z = column.floor() / d;
        Vec3::new(x, y, z)
    }

    /// Nearest lookup into `atlas` with explicit out-of-bounds reporting.
    pub fn sample(&self, atlas: &Field, uvw: Vec3) -> VolumeSample {
        let inside = (0.0..=1.0).contains(&uvw.x)
            && (0.0..=1.0).contains(&uvw.y)
            && (0.0..=1.0).contains(&uvw.z);
        if !inside {
            return VolumeSample::OutOfBounds;
        }
        atlas
            .sample_checked(self.tile_uv(uvw))
            .map_or(VolumeSample::OutOfBounds, VolumeSample::Inside)
    }
}
