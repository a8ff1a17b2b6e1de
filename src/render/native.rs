use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4};
use log::{debug, warn};
use wgpu::util::DeviceExt;
use winit::window::{Window, WindowId};

use super::common::{CameraParams, LightParams, MAX_POINT_LIGHTS};
use super::FrameSurface;
use crate::geometry::MeshData;
use crate::scene::{HeroScene, InteractiveShape, ParticleField};

/// GPU renderer backed by wgpu that draws the hero scene into a window.
///
/// Shapes are drawn as lit wireframes, the particle field as additive
/// points. The surface is cleared to transparent every frame.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    /// Logical size; the surface is configured at `size * pixel_ratio`.
    size: (u32, u32),
    pixel_ratio: f32,
    depth: DepthBuffer,
    wire_pipeline: wgpu::RenderPipeline,
    point_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    shapes: Vec<ShapeBuffers>,
    particles: Option<ParticleBuffers>,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(
        window: Arc<Window>,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("hero-device"),
            ..Default::default()
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no texture formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|mode| {
                matches!(
                    mode,
                    wgpu::CompositeAlphaMode::PreMultiplied
                        | wgpu::CompositeAlphaMode::PostMultiplied
                )
            })
            .or_else(|| surface_caps.alpha_modes.first().copied())
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (physical_width, physical_height) = physical_size(width, height, pixel_ratio);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: physical_width,
            height: physical_height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("hero-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = uniform_layout::<GlobalUniform>(&device, "global-bind-layout");
        let object_layout = uniform_layout::<ObjectConstants>(&device, "object-bind-layout");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("hero-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let wire_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            PipelineKind {
                label: "wireframe-pipeline",
                vertex_entry: "vs_wire",
                fragment_entry: "fs_wire",
                stride: 6,
                attributes: &[
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: (3 * std::mem::size_of::<f32>()) as u64,
                        shader_location: 1,
                    },
                ],
                topology: wgpu::PrimitiveTopology::LineList,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: true,
            },
            surface_format,
        );
        let point_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            PipelineKind {
                label: "particle-pipeline",
                vertex_entry: "vs_points",
                fragment_entry: "fs_points",
                stride: 3,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                }],
                topology: wgpu::PrimitiveTopology::PointList,
                blend: ADDITIVE_BLENDING,
                depth_write: false,
            },
            surface_format,
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size: (width, height),
            pixel_ratio,
            depth,
            wire_pipeline,
            point_pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            shapes: Vec::new(),
            particles: None,
        })
    }

    /// Returns the identifier of the window the renderer presents to.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn reconfigure(&mut self) {
        let (width, height) = physical_size(self.size.0, self.size.1, self.pixel_ratio);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, width, height);
    }

    /// Updates the camera and lighting uniforms before rendering.
    fn update_globals(&self, camera: &CameraParams, lights: &LightParams) {
        let mut uniform = GlobalUniform {
            view_proj: camera.view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            ambient: lights.ambient.extend(1.0).into(),
            light_positions: [[0.0; 4]; MAX_POINT_LIGHTS],
            light_colors: [[0.0; 4]; MAX_POINT_LIGHTS],
            light_count: [lights.points.len() as u32, 0, 0, 0],
        };
        for (slot, light) in lights.points.iter().enumerate() {
            uniform.light_positions[slot] = light.position.extend(1.0).into();
            uniform.light_colors[slot] = (light.color * light.intensity).extend(1.0).into();
        }
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    fn object_bindings(&self, label: &str) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}-uniform")),
            size: std::mem::size_of::<ObjectConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}-bind-group")),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        (buffer, bind_group)
    }

    fn upload_shape(&self, shape: &InteractiveShape) -> ShapeBuffers {
        let (uniform, bind_group) = self.object_bindings(&shape.name);
        ShapeBuffers::from_mesh(&self.device, &shape.mesh, &shape.name, uniform, bind_group)
    }

    fn upload_particles(&self, particles: &ParticleField) -> ParticleBuffers {
        let positions: Vec<[f32; 3]> = particles.positions().iter().map(|p| p.to_array()).collect();
        let vertex = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("particle-positions"),
                contents: bytemuck::cast_slice(&positions),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let (uniform, bind_group) = self.object_bindings("particles");
        ParticleBuffers {
            vertex,
            count: positions.len() as u32,
            uniform,
            bind_group,
        }
    }
}

impl FrameSurface for Renderer {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Resizes the swap chain to match the new logical dimensions.
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.reconfigure();
    }

    fn prepare(&mut self, scene: &HeroScene) -> Result<()> {
        if !self.shapes.is_empty() {
            return Ok(());
        }
        self.shapes = scene.shapes.iter().map(|shape| self.upload_shape(shape)).collect();
        self.particles = Some(self.upload_particles(&scene.particles));
        debug!(
            "uploaded {} shapes and {} particles",
            self.shapes.len(),
            scene.particles.len()
        );
        Ok(())
    }

    fn render(&mut self, scene: &HeroScene) -> Result<()> {
        if self.particles.is_none() {
            bail!("render called before prepare");
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timed out; skipping frame");
                return Ok(());
            }
            Err(err) => return Err(anyhow!("failed to acquire surface texture: {err}")),
        };

        self.update_globals(
            &CameraParams::from_camera(&scene.camera),
            &LightParams::from_lights(&scene.lights),
        );
        for (buffers, shape) in self.shapes.iter().zip(scene.shapes.iter()) {
            let constants = ObjectConstants::for_shape(shape);
            self.queue
                .write_buffer(&buffers.uniform, 0, bytes_of(&constants));
        }
        let Some(particles) = self.particles.as_ref() else {
            bail!("render called before prepare");
        };
        let constants = ObjectConstants::for_particles(&scene.particles);
        self.queue
            .write_buffer(&particles.uniform, 0, bytes_of(&constants));

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hero-encoder"),
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("hero-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_bind_group(0, &self.global_bind_group, &[]);

        pass.set_pipeline(&self.point_pipeline);
        pass.set_vertex_buffer(0, particles.vertex.slice(..));
        pass.set_bind_group(1, &particles.bind_group, &[]);
        pass.draw(0..particles.count, 0..1);

        pass.set_pipeline(&self.wire_pipeline);
        for shape in &self.shapes {
            pass.set_vertex_buffer(0, shape.vertex.slice(..));
            pass.set_index_buffer(shape.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.set_bind_group(1, &shape.bind_group, &[]);
            pass.draw_indexed(0..shape.index_count, 0, 0..1);
        }

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn release(&mut self) {
        for shape in self.shapes.drain(..) {
            shape.vertex.destroy();
            shape.index.destroy();
            shape.uniform.destroy();
        }
        if let Some(particles) = self.particles.take() {
            particles.vertex.destroy();
            particles.uniform.destroy();
        }
    }
}

fn physical_size(width: u32, height: u32, pixel_ratio: f32) -> (u32, u32) {
    (
        ((width as f32 * pixel_ratio).round() as u32).max(1),
        ((height as f32 * pixel_ratio).round() as u32).max(1),
    )
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

struct PipelineKind<'a> {
    label: &'a str,
    vertex_entry: &'a str,
    fragment_entry: &'a str,
    /// Floats per vertex.
    stride: usize,
    attributes: &'a [wgpu::VertexAttribute],
    topology: wgpu::PrimitiveTopology,
    blend: wgpu::BlendState,
    depth_write: bool,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    kind: PipelineKind<'_>,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(kind.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(kind.vertex_entry),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: (kind.stride * std::mem::size_of::<f32>()) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: kind.attributes,
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: kind.topology,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthBuffer::FORMAT,
            depth_write_enabled: kind.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(kind.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(kind.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

struct ShapeBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ShapeBuffers {
    fn from_mesh(
        device: &wgpu::Device,
        mesh: &MeshData,
        label: &str,
        uniform: wgpu::Buffer,
        bind_group: wgpu::BindGroup,
    ) -> Self {
        let edges = mesh.edge_indices();
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-edges")),
            contents: bytemuck::cast_slice(&edges),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: edges.len() as u32,
            uniform,
            bind_group,
        }
    }
}

struct ParticleBuffers {
    vertex: wgpu::Buffer,
    count: u32,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    light_positions: [[f32; 4]; MAX_POINT_LIGHTS],
    light_colors: [[f32; 4]; MAX_POINT_LIGHTS],
    light_count: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    emissive: [f32; 4],
}

impl ObjectConstants {
    fn for_shape(shape: &InteractiveShape) -> Self {
        let model = shape.transform.matrix();
        Self::new(
            model,
            shape.current.color.extend(shape.current.opacity).into(),
            shape.emissive().extend(0.0).into(),
        )
    }

    fn for_particles(particles: &ParticleField) -> Self {
        Self::new(
            particles.transform.matrix(),
            particles.color.extend(particles.opacity).into(),
            [0.0; 4],
        )
    }

    fn new(model: Mat4, color: [f32; 4], emissive: [f32; 4]) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            color,
            emissive,
        }
    }
}

const SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    light_positions: array<vec4<f32>, 4>,
    light_colors: array<vec4<f32>, 4>,
    light_count: vec4<u32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    emissive: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct WireInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct WireOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_wire(input: WireInput) -> WireOutput {
    var out: WireOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

@fragment
fn fs_wire(input: WireOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let view_dir = normalize(globals.camera_position.xyz - input.world_pos);
    var light = globals.ambient.rgb;
    for (var i = 0u; i < min(globals.light_count.x, 4u); i = i + 1u) {
        let light_dir = normalize(globals.light_positions[i].xyz - input.world_pos);
        let diffuse = max(dot(normal, light_dir), 0.0);
        let half_dir = normalize(light_dir + view_dir);
        let specular = pow(max(dot(normal, half_dir), 0.0), 30.0) * 0.1;
        light = light + globals.light_colors[i].rgb * (diffuse + specular);
    }
    let lit = object.color.rgb * light + object.emissive.rgb;
    return vec4<f32>(min(lit, vec3<f32>(1.0)), object.color.a);
}

struct PointOutput {
    @builtin(position) position: vec4<f32>,
}

@vertex
fn vs_points(@location(0) position: vec3<f32>) -> PointOutput {
    var out: PointOutput;
    out.position = globals.view_proj * object.model * vec4<f32>(position, 1.0);
    return out;
}

@fragment
fn fs_points(input: PointOutput) -> @location(0) vec4<f32> {
    return object.color;
}
"#;
