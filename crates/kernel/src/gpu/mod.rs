//! GPU (Metal/Vulkan/DX12 via wgpu) implementation of the stable-fluids solver.
//!
//! `GpuSolver` implements [`FluidBackend`] with one render pipeline per stage.
//!
//! # Architecture
//! - Every pass draws a single oversized triangle into the stage's output
//!   texture, cleared to `(0, 0, 0, 1)` first.
//! - All passes of a frame are recorded into one command encoder and
//!   submitted by [`FluidBackend::end_frame`]; submission order makes each
//!   committed write visible to the next pass.
//! - Field data stays on the GPU; readback only on demand.
//!
//! # Bind group layout
//! - Group 0: `StageParams` uniform, one buffer per stage kind.
//! - Group 1: the stage's sampled textures, in sampler declaration order.

pub mod textures;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use textures::GpuField;

use crate::binding::FieldSet;
use crate::cpu::check_size;
use crate::error::KernelError;
use crate::field::{Field, FieldSize, FieldSlot};
use crate::shaders;
use crate::stage::{compile_stages, SolverStage, StageKind};
use crate::uniforms::{StageParams, STAGE_PARAMS_SIZE};
use crate::FluidBackend;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

/// Compiled render pipeline plus the layout of its texture bind group.
pub struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    textures_layout: wgpu::BindGroupLayout,
}

/// Uniform buffer and bind group for one stage kind.
struct StageUniforms {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Check whether a GPU adapter is available.
pub fn gpu_available() -> bool {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }));
    adapter.is_some()
}

/// wgpu-backed solver.
pub struct GpuSolver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: FieldSize,
    params_layout: wgpu::BindGroupLayout,
    uniforms: Vec<StageUniforms>,
    stages: Option<Vec<SolverStage<GpuProgram>>>,
    fields: Option<FieldSet<GpuField>>,
    encoder: Option<wgpu::CommandEncoder>,
    lost: Arc<AtomicBool>,
}

impl GpuSolver {
    /// Acquire a device for a `size` grid.
    ///
    /// Returns `Err(KernelError::GpuInit)` if no suitable adapter is found,
    /// allowing callers to fall back to [`crate::CpuSolver`].
    pub fn new(size: FieldSize) -> Result<Self, KernelError> {
        // --- Device initialization ---
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| KernelError::GpuInit("No suitable GPU adapter found".into()))?;

        tracing::info!("GPU adapter: {:?}", adapter.get_info().name);

        let adapter_limits = adapter.limits();
        if size.width > adapter_limits.max_texture_dimension_2d
            || size.height > adapter_limits.max_texture_dimension_2d
        {
            return Err(KernelError::GpuInit(format!(
                "{}x{} exceeds max texture dimension {}",
                size.width, size.height, adapter_limits.max_texture_dimension_2d
            )));
        }
        let mut required_limits = wgpu::Limits::downlevel_defaults();
        required_limits.max_texture_dimension_2d = adapter_limits.max_texture_dimension_2d;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("stam_gpu_device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| KernelError::GpuInit(format!("Failed to create device: {e}")))?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            lost_flag.store(true, Ordering::Release);
            tracing::warn!("GPU device lost ({reason:?}): {message}");
        });

        // --- Uniforms ---
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stage_params_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(STAGE_PARAMS_SIZE as u64),
                },
                count: None,
            }],
        });
        let uniforms = StageKind::ALL
            .iter()
            .map(|kind| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(kind.label()),
                    size: STAGE_PARAMS_SIZE as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(kind.label()),
                    layout: &params_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                StageUniforms { buffer, bind_group }
            })
            .collect();

        Ok(Self {
            device,
            queue,
            size,
            params_layout,
            uniforms,
            stages: None,
            fields: None,
            encoder: None,
            lost,
        })
    }

    /// Acquire a device, compile every program and allocate fields.
    pub fn ready(size: FieldSize) -> Result<Self, KernelError> {
        let mut solver = Self::new(size)?;
        solver.compile_programs()?;
        solver.allocate_fields()?;
        Ok(solver)
    }

    fn compile_program(&self, kind: StageKind) -> Result<GpuProgram, KernelError> {
        let device = &self.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kind.label()),
            source: wgpu::ShaderSource::Wgsl(shaders::stage_source(kind).into()),
        });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..kind.samplers().len())
            .map(|binding| bgl_texture(binding as u32))
            .collect();
        let textures_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(kind.label()),
            entries: &texture_entries,
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(kind.label()),
            bind_group_layouts: &[&self.params_layout, &textures_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(kind.label()),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(shaders::VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(shaders::FRAGMENT_ENTRY_NAME),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: textures::FIELD_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(KernelError::ShaderCompilation {
                stage: kind,
                message: err.to_string(),
            });
        }
        Ok(GpuProgram {
            pipeline,
            textures_layout,
        })
    }

    fn check_device(&self) -> Result<(), KernelError> {
        if self.lost.load(Ordering::Acquire) {
            return Err(KernelError::Device("device lost".into()));
        }
        Ok(())
    }

    /// Record a clear of `target` into `encoder`.
    fn encode_clear(encoder: &mut wgpu::CommandEncoder, target: &GpuField) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("field_clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

impl FluidBackend for GpuSolver {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn resolution(&self) -> FieldSize {
        self.size
    }

    fn compile_programs(&mut self) -> Result<(), KernelError> {
        let start = Instant::now();
        let stages = compile_stages(|kind| self.compile_program(kind))?;
        self.stages = Some(stages);
        tracing::info!("GPU stage programs compiled in {:?}", start.elapsed());
        Ok(())
    }

    fn allocate_fields(&mut self) -> Result<(), KernelError> {
        let device = &self.device;
        let size = self.size;
        let mut fields = FieldSet::new(|slot| GpuField::new(device, size, &format!("{slot:?}")));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("field_init"),
        });
        fields.reset_with(|f| Self::encode_clear(&mut encoder, f));
        self.queue.submit(Some(encoder.finish()));

        self.fields = Some(fields);
        tracing::info!("GPU solver allocated {}x{} fields", size.width, size.height);
        Ok(())
    }

    fn programs_ready(&self) -> bool {
        self.stages.is_some() && self.fields.is_some() && !self.lost.load(Ordering::Acquire)
    }

    fn run_pass(&mut self, kind: StageKind, params: &StageParams) -> Result<(), KernelError> {
        self.check_device()?;
        let stages = self
            .stages
            .as_ref()
            .ok_or(KernelError::NotInitialized("pass issued"))?;
        let fields = self
            .fields
            .as_mut()
            .ok_or(KernelError::NotInitialized("pass issued"))?;
        let program = stages[kind.index()].program();
        let uniforms = &self.uniforms[kind.index()];
        self.queue
            .write_buffer(&uniforms.buffer, 0, bytemuck::bytes_of(params));

        let (inputs, output) = fields.bind(kind);
        let entries: Vec<wgpu::BindGroupEntry> = inputs
            .ordered()?
            .into_iter()
            .enumerate()
            .map(|(binding, field)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(&field.view),
            })
            .collect();
        let textures = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kind.label()),
            layout: &program.textures_layout,
            entries: &entries,
        });

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fluid_frame"),
            })
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(kind.label()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &uniforms.bind_group, &[]);
            pass.set_bind_group(1, &textures, &[]);
            pass.draw(0..3, 0..1);
        }
        fields.commit(kind)
    }

    fn end_frame(&mut self) -> Result<(), KernelError> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        self.check_device()
    }

    fn read_field(&mut self, slot: FieldSlot) -> Result<Field, KernelError> {
        self.end_frame()?;
        let fields = self
            .fields
            .as_ref()
            .ok_or(KernelError::NotInitialized("field read"))?;
        textures::read_back(&self.device, &self.queue, fields.current(slot), self.size)
    }

    fn write_field(&mut self, slot: FieldSlot, field: &Field) -> Result<(), KernelError> {
        check_size(self.size, slot, field)?;
        self.end_frame()?;
        let fields = self
            .fields
            .as_ref()
            .ok_or(KernelError::NotInitialized("field write"))?;
        textures::upload(&self.queue, fields.current(slot), field);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), KernelError> {
        self.end_frame()?;
        let Some(fields) = self.fields.as_mut() else {
            return Ok(());
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("field_reset"),
            });
        fields.reset_with(|f| Self::encode_clear(&mut encoder, f));
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bgl_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}
