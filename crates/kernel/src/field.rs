//! Two-dimensional RGBA32F field storage.
//!
//! Every solver quantity lives in a `Field`: a row-major grid of `Vec4`
//! texels addressed by normalized `uv` coordinates in `[0,1]^2`. Texel `(i, j)`
//! has its center at `((i + 0.5) / W, (j + 0.5) / H)`.
//!
//! Sampling is nearest-neighbour with clamp-to-border semantics: any
//! coordinate outside the unit square returns [`BORDER`], whose alpha of 1
//! doubles as the in-band out-of-bounds marker.

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Value returned for every out-of-bounds sample.
pub const BORDER: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Grid resolution in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSize {
    /// Texels along x.
    pub width: u32,
    /// Texels along y.
    pub height: u32,
}

impl FieldSize {
    /// Create a size, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, KernelError> {
        if width == 0 || height == 0 {
            return Err(KernelError::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// Square grid of `n x n` texels.
    pub fn square(n: u32) -> Result<Self, KernelError> {
        Self::new(n, n)
    }

    /// Number of texels.
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Resolution as a float vector, as carried in the stage uniforms.
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Size of one texel in uv units.
    pub fn texel(&self) -> Vec2 {
        Vec2::ONE / self.as_vec2()
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Normalized coordinate of the center of texel `(i, j)`.
    pub fn texel_center(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new(
            (i as f32 + 0.5) / self.width as f32,
            (j as f32 + 0.5) / self.height as f32,
        )
    }

    /// Whether `(i, j)` is at least one texel away from every edge.
    pub fn is_interior(&self, i: usize, j: usize) -> bool {
        i >= 1
            && j >= 1
            && i + 1 < self.width as usize
            && j + 1 < self.height as usize
    }
}

/// Named storage locations owned by a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldSlot {
    /// Ping-pong velocity field (xy = velocity).
    Velocity,
    /// Ping-pong pressure field (x = pressure).
    Pressure,
    /// Ping-pong advected quantity (dye).
    Quantity,
    /// Single buffer holding the velocity divergence.
    Scratch,
    /// Final composite output.
    Composite,
}

/// Dense RGBA32F grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    size: FieldSize,
    texels: Vec<Vec4>,
}

impl Field {
    /// Field initialised to the cleared value `(0, 0, 0, 1)`.
    pub fn new(size: FieldSize) -> Self {
        Self::filled(size, BORDER)
    }

    /// Field with every texel set to `value`.
    pub fn filled(size: FieldSize, value: Vec4) -> Self {
        Self {
            size,
            texels: vec![value; size.texel_count()],
        }
    }

    /// Build a field by evaluating `f` at every texel center.
    pub fn from_fn(size: FieldSize, mut f: impl FnMut(Vec2) -> Vec4) -> Self {
        let mut texels = Vec::with_capacity(size.texel_count());
        for j in 0..size.height as usize {
            for i in 0..size.width as usize {
                texels.push(f(size.texel_center(i, j)));
            }
        }
        Self { size, texels }
    }

    /// Wrap raw row-major texels.
    pub fn from_texels(size: FieldSize, texels: Vec<Vec4>) -> Result<Self, KernelError> {
        if texels.len() != size.texel_count() {
            return Err(KernelError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }
        Ok(Self { size, texels })
    }

    /// Grid resolution.
    pub fn size(&self) -> FieldSize {
        self.size
    }

    /// Row-major texel storage.
    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    /// Mutable row-major texel storage.
    pub fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    fn index(&self, i: usize, j: usize) -> usize {
        j * self.size.width as usize + i
    }

    /// Texel at integer coordinates. Panics when out of range.
    pub fn get(&self, i: usize, j: usize) -> Vec4 {
        self.texels[self.index(i, j)]
    }

    /// Overwrite texel `(i, j)`.
    pub fn set(&mut self, i: usize, j: usize, value: Vec4) {
        let idx = self.index(i, j);
        self.texels[idx] = value;
    }

    /// Integer texel addressed by `uv`, or `None` outside the unit square.
    pub fn texel_at(&self, uv: Vec2) -> Option<(usize, usize)> {
        if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
            return None;
        }
        let w = self.size.width;
        let h = self.size.height;
        let i = ((uv.x * w as f32).floor() as u32).min(w - 1);
        let j = ((uv.y * h as f32).floor() as u32).min(h - 1);
        Some((i as usize, j as usize))
    }

    /// Nearest sample with clamp-to-border addressing.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        self.sample_checked(uv).unwrap_or(BORDER)
    }

    /// Nearest sample that reports out-of-bounds explicitly instead of
    /// returning the border colour.
    pub fn sample_checked(&self, uv: Vec2) -> Option<Vec4> {
        self.texel_at(uv).map(|(i, j)| self.get(i, j))
    }

    /// Set every texel to `value`.
    pub fn fill(&mut self, value: Vec4) {
        self.texels.fill(value);
    }

    /// Reset to the cleared value `(0, 0, 0, 1)`.
    pub fn clear(&mut self) {
        self.fill(BORDER);
    }

    /// Iterate `(i, j, value)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Vec4)> + '_ {
        let w = self.size.width as usize;
        self.texels
            .iter()
            .enumerate()
            .map(move |(idx, v)| (idx % w, idx / w, *v))
    }

    /// Largest absolute difference across all channels of two equally sized fields.
    pub fn max_abs_diff(&self, other: &Field) -> f32 {
        self.texels
            .iter()
            .zip(&other.texels)
            .map(|(a, b)| (*a - *b).abs().max_element())
            .fold(0.0, f32::max)
    }
}
