//! wgpu backend: surface + depth + one lit/textured pipeline.
//! wgpu = 26.x, winit = 0.30.x
//!
//! Draws issued between [`GpuContext::begin_frame`] and
//! [`GpuContext::end_frame`] are queued with their own vertex, index and
//! uniform buffers and encoded into a single render pass at the end of the
//! frame.

use std::num::NonZeroU64;
use std::sync::Arc;

use asset::{MeshVertex, TextureData};
use bytemuck::{Pod, Zeroable};
use corelib::{Mat4, lighting::SPECULAR_POWER};
use log::{debug, info};
use wgpu::{
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, BlendState,
    Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, DepthBiasState, DepthStencilState, Device, DeviceDescriptor,
    Extent3d, Features, FilterMode, FragmentState, FrontFace, IndexFormat, Instance,
    InstanceDescriptor, Limits, LoadOp, Operations, Origin3d, PipelineLayoutDescriptor,
    PowerPreference, PresentMode, Queue, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface, SurfaceConfiguration,
    SurfaceError, TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureSampleType, TextureUsages, TextureView,
    TextureViewDescriptor, TextureViewDimension, VertexBufferLayout, VertexState, VertexStepMode,
    util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    RenderError, RenderResult,
    context::{EffectState, PrimitiveTopology, RenderContext},
};

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 100.0 / 255.0,
    g: 149.0 / 255.0,
    b: 237.0 / 255.0,
    a: 1.0,
};

const VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: std::mem::size_of::<MeshVertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
};

/// Effect UBO, mirrors `Effect` in `shaders/basic.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct EffectUniform {
    world: [[f32; 4]; 4],
    view_proj: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
    eye: [f32; 4],
    ambient: [f32; 4],
    params: [f32; 4],
    light_dir: [[f32; 4]; 3],
    light_diffuse: [[f32; 4]; 3],
    light_specular: [[f32; 4]; 3],
}

impl EffectUniform {
    fn from_effect(effect: &EffectState) -> Self {
        let mut uniform = Self {
            world: effect.world.to_cols_array_2d(),
            view_proj: effect.view_projection().to_cols_array_2d(),
            normal: Mat4::from_mat3(effect.normal_matrix()).to_cols_array_2d(),
            eye: effect.eye_position().extend(1.0).to_array(),
            ambient: effect.lighting.ambient.extend(1.0).to_array(),
            params: [f32::from(u8::from(effect.texture_enabled)), 0.0, 0.0, 0.0],
            ..Self::zeroed()
        };
        for (i, light) in effect.lighting.lights.iter().enumerate() {
            let enabled = f32::from(u8::from(light.enabled));
            uniform.light_dir[i] = light.direction.extend(enabled).to_array();
            uniform.light_diffuse[i] = light.diffuse.extend(0.0).to_array();
            uniform.light_specular[i] = light.specular.extend(SPECULAR_POWER).to_array();
        }
        uniform
    }
}

/// Texture uploaded to the GPU together with its sampler bind group.
pub struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: Arc<BindGroup>,
}

struct QueuedDraw {
    effect: Arc<BindGroup>,
    texture: Arc<BindGroup>,
    vertices: Buffer,
    indices: Option<Buffer>,
    count: u32,
}

pub struct GpuContext {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Pipeline
    pipeline: RenderPipeline,
    effect_bgl: BindGroupLayout,
    texture_bgl: BindGroupLayout,
    sampler: Sampler,
    white: GpuTexture,

    // Frame state
    bound: Option<(Arc<BindGroup>, Arc<BindGroup>)>,
    draws: Vec<QueuedDraw>,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuContext {
    /// Create the GPU state bound to an `Arc<Window>`, restricted to
    /// `backends`.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> RenderResult<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .map_err(|e| RenderError::Gpu(format!("create_surface failed: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Gpu(format!("no suitable GPU adapter: {e}")))?;
        let adapter_info = adapter.get_info();
        info!(
            "Using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Viewer Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| RenderError::Gpu(format!("request_device failed: {e}")))?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Gpu("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Shaders ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Basic Effect WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/basic.wgsl").into()),
        });

        // ==== Bind group layouts ====
        let effect_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Effect BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<EffectUniform>() as u64),
                },
                count: None,
            }],
        });
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Texture BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Base Color Sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        // ==== Pipeline ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Basic Effect PipelineLayout"),
            bind_group_layouts: &[&effect_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[VERTEX_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // Meshes are rewound at import; clockwise is front facing.
            primitive: wgpu::PrimitiveState {
                front_face: FrontFace::Cw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let white = upload_texture(
            &device,
            &queue,
            &texture_bgl,
            &sampler,
            "White Texture",
            1,
            1,
            &[255; 4],
        );

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            pipeline,
            effect_bgl,
            texture_bgl,
            sampler,
            white,
            bound: None,
            draws: Vec::new(),
            depth_view,
            width,
            height,
        })
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Drop anything queued by a previous, unfinished frame.
    pub fn begin_frame(&mut self) {
        self.draws.clear();
        self.bound = None;
    }

    /// Clear, encode every queued draw and present.
    pub fn end_frame(&mut self) -> Result<(), SurfaceError> {
        let draws = std::mem::take(&mut self.draws);
        self.bound = None;

        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(CLEAR_COLOR),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            rpass.set_pipeline(&self.pipeline);
            for draw in &draws {
                rpass.set_bind_group(0, draw.effect.as_ref(), &[]);
                rpass.set_bind_group(1, draw.texture.as_ref(), &[]);
                rpass.set_vertex_buffer(0, draw.vertices.slice(..));
                match &draw.indices {
                    Some(indices) => {
                        rpass.set_index_buffer(indices.slice(..), IndexFormat::Uint32);
                        rpass.draw_indexed(0..draw.count, 0, 0..1);
                    }
                    None => rpass.draw(0..draw.count, 0..1),
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }

    /// Bind groups for the next draw, or `None` when no effect has been
    /// applied yet.
    fn prepare_draw(&self) -> Option<(Arc<BindGroup>, Arc<BindGroup>)> {
        if self.bound.is_none() {
            debug!("Draw issued before any effect was applied, skipping");
        }
        self.bound.clone()
    }

    fn vertex_buffer(&self, vertices: &[MeshVertex]) -> Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh VB"),
                contents: bytemuck::cast_slice(vertices),
                usage: BufferUsages::VERTEX,
            })
    }
}

impl RenderContext for GpuContext {
    type Texture = GpuTexture;

    fn create_texture(&mut self, texture: &TextureData) -> RenderResult<Self::Texture> {
        if !texture.is_valid() {
            return Err(RenderError::TextureCreation(format!(
                "{}x{} texture with {} bytes of pixel data",
                texture.width,
                texture.height,
                texture.data.len()
            )));
        }
        let limit = self.device.limits().max_texture_dimension_2d;
        if texture.width > limit || texture.height > limit {
            return Err(RenderError::TextureCreation(format!(
                "{}x{} exceeds the device limit of {limit}",
                texture.width, texture.height
            )));
        }
        Ok(upload_texture(
            &self.device,
            &self.queue,
            &self.texture_bgl,
            &self.sampler,
            "Mesh Texture",
            texture.width,
            texture.height,
            &texture.data,
        ))
    }

    fn destroy_texture(&mut self, texture: Self::Texture) {
        texture.texture.destroy();
    }

    fn apply_effect(&mut self, effect: &EffectState, texture: Option<&Self::Texture>) {
        let uniform = EffectUniform::from_effect(effect);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Effect UBO"),
                contents: bytemuck::bytes_of(&uniform),
                usage: BufferUsages::UNIFORM,
            });
        let effect_bg = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Effect BG"),
            layout: &self.effect_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        let texture_bg = texture.map_or(&self.white.bind_group, |t| &t.bind_group);
        self.bound = Some((Arc::new(effect_bg), Arc::clone(texture_bg)));
    }

    fn draw_user_primitives(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[MeshVertex],
        primitive_count: usize,
    ) {
        let count = topology.element_count(primitive_count).min(vertices.len());
        if count == 0 {
            return;
        }
        let Some((effect, texture)) = self.prepare_draw() else {
            return;
        };
        let vertices = self.vertex_buffer(vertices);
        self.draws.push(QueuedDraw {
            effect,
            texture,
            vertices,
            indices: None,
            count: count as u32,
        });
    }

    fn draw_user_indexed_primitives(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[MeshVertex],
        indices: &[u32],
        primitive_count: usize,
    ) {
        let count = topology.element_count(primitive_count).min(indices.len());
        if count == 0 || vertices.is_empty() {
            return;
        }
        let Some((effect, texture)) = self.prepare_draw() else {
            return;
        };
        let vertex_buf = self.vertex_buffer(vertices);
        let index_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh IB"),
                contents: bytemuck::cast_slice(&indices[..count]),
                usage: BufferUsages::INDEX,
            });
        self.draws.push(QueuedDraw {
            effect,
            texture,
            vertices: vertex_buf,
            indices: Some(index_buf),
            count: count as u32,
        });
    }

    fn release_effect(&mut self) {
        self.bound = None;
        self.draws.clear();
    }

    fn backend_name(&self) -> &'static str {
        "wgpu"
    }
}

#[allow(clippy::too_many_arguments)]
fn upload_texture(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    sampler: &Sampler,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> GpuTexture {
    let size = Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        rgba,
        TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
        ],
    });
    GpuTexture {
        texture,
        bind_group: Arc::new(bind_group),
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
