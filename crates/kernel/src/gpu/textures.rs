//! GPU texture management for solver fields.
//!
//! Every field is an `Rgba32Float` 2D texture without mipmaps, usable as a
//! render target, a sampled input and a copy source/destination. Handles
//! CPU->GPU upload and GPU->CPU readback.

use glam::Vec4;

use crate::error::KernelError;
use crate::field::{Field, FieldSize};

/// Storage format of every field texture.
pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Bytes per `Rgba32Float` texel.
const TEXEL_BYTES: u32 = 16;

/// A field texture and its default view.
pub struct GpuField {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl std::fmt::Debug for GpuField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuField").field("size", &self.texture.size()).finish()
    }
}

impl GpuField {
    pub fn new(device: &wgpu::Device, size: FieldSize, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FIELD_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

fn extent(size: FieldSize) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

fn texture_copy(texture: &wgpu::Texture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

/// Row pitch of a readback buffer, rounded up to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Upload `field` into `target`. Takes effect before the next submission.
pub fn upload(queue: &wgpu::Queue, target: &GpuField, field: &Field) {
    let size = field.size();
    queue.write_texture(
        texture_copy(&target.texture),
        bytemuck::cast_slice(field.texels()),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * TEXEL_BYTES),
            rows_per_image: Some(size.height),
        },
        extent(size),
    );
}

/// Copy `source` back to host memory, blocking until the GPU is done.
pub fn read_back(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &GpuField,
    size: FieldSize,
) -> Result<Field, KernelError> {
    let padded = padded_bytes_per_row(size.width);
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("field_readback"),
        size: padded as u64 * size.height as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("field_readback"),
    });
    encoder.copy_texture_to_buffer(
        texture_copy(&source.texture),
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size.height),
            },
        },
        extent(size),
    );
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| KernelError::Device(format!("readback channel closed: {e}")))?
        .map_err(|e| KernelError::Device(format!("readback map failed: {e}")))?;

    let row_bytes = (size.width * TEXEL_BYTES) as usize;
    let mut texels = Vec::with_capacity(size.texel_count());
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize) {
            let values: Vec<[f32; 4]> = bytemuck::pod_collect_to_vec(&row[..row_bytes]);
            texels.extend(values.into_iter().map(Vec4::from_array));
        }
    }
    staging.unmap();
    Field::from_texels(size, texels)
}
