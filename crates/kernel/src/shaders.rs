//! WGSL source composition for the stage programs.
//!
//! Every program is the shared header, the stage building blocks, one texture
//! declaration per sampler the stage reads (group 1, in declaration order) and
//! the stage's `stage_main`. The fragment entry point is appended last.

use crate::stage::StageKind;

const COMMON: &str = include_str!("shaders/common.wgsl");
const STAGE_MATH: &str = include_str!("shaders/stage_math.wgsl");

const FRAGMENT_ENTRY: &str = "
@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return stage_main(frag_coord.xy / params.resolution);
}
";

/// Vertex entry point name.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment entry point name.
pub const FRAGMENT_ENTRY_NAME: &str = "fs_main";

fn stage_body(kind: StageKind) -> &'static str {
    match kind {
        StageKind::AdvectVelocity => include_str!("shaders/advect_velocity.wgsl"),
        StageKind::AdvectQuantity => include_str!("shaders/advect_quantity.wgsl"),
        StageKind::Force => include_str!("shaders/force.wgsl"),
        StageKind::Diffuse => include_str!("shaders/diffuse.wgsl"),
        StageKind::Divergence => include_str!("shaders/divergence.wgsl"),
        StageKind::Pressure => include_str!("shaders/pressure.wgsl"),
        StageKind::Gradient => include_str!("shaders/gradient.wgsl"),
        StageKind::Composite => include_str!("shaders/composite.wgsl"),
    }
}

/// Texture declarations for the samplers of `kind`.
pub fn sampler_declarations(kind: StageKind) -> String {
    kind.samplers()
        .iter()
        .enumerate()
        .map(|(binding, sampler)| {
            format!(
                "@group(1) @binding({binding}) var {}: texture_2d<f32>;\n",
                sampler.binding_name()
            )
        })
        .collect()
}

/// Complete WGSL module for `kind`.
pub fn stage_source(kind: StageKind) -> String {
    let declarations = sampler_declarations(kind);
    let body = stage_body(kind);
    let mut src = String::with_capacity(
        COMMON.len() + STAGE_MATH.len() + declarations.len() + body.len() + FRAGMENT_ENTRY.len(),
    );
    src.push_str(COMMON);
    src.push_str(STAGE_MATH);
    src.push_str(&declarations);
    src.push_str(body);
    src.push_str(FRAGMENT_ENTRY);
    src
}
