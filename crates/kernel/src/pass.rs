//! Full-screen pass execution on the CPU.

use glam::{Vec2, Vec4};
use rayon::prelude::*;

use crate::field::Field;

/// Evaluate `program` at the center of every texel of `output`, one row per
/// rayon task.
///
/// Every texel is overwritten, which subsumes the `(0, 0, 0, 1)` clear the
/// GPU path performs before each render.
pub fn execute_pass<F>(output: &mut Field, program: F)
where
    F: Fn(Vec2) -> Vec4 + Sync,
{
    let size = output.size();
    let width = size.width as usize;
    output
        .texels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, texel) in row.iter_mut().enumerate() {
                *texel = program(size.texel_center(i, j));
            }
        });
}
