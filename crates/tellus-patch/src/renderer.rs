//! GPU renderer for patch instances: one instanced indexed draw of the
//! reference grid, with the morph blend evaluated in the vertex shader.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use tellus_triangulate::PatchInstance;

use crate::grid::{PatchGrid, PatchVertex};

/// Capacity of the shader-visible split-distance table. Bounds the
/// supported `max_level`; far deeper recursion is impractical anyway.
pub const MAX_LUT_LEVELS: usize = 32;

/// WGSL shader for the patch pipeline. The morph blend in `morph_factor`
/// is mirrored on the CPU by [`crate::grid::morph_factor`] so the seam
/// behavior is testable without a GPU.
const PATCH_SHADER: &str = r#"
struct PatchUniforms {
    model: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    camera_pos: vec3<f32>,
    radius: f32,
    morph_range: f32,
};

struct DistanceLut {
    entries: array<vec4<f32>, 32>,
};

struct VertexInput {
    @location(0) pos: vec2<f32>,
    @location(1) morph: vec2<f32>,
    // Instance attributes
    @location(2) level: u32,
    @location(3) a: vec3<f32>,
    @location(4) r: vec3<f32>,
    @location(5) s: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) @interpolate(flat) level: u32,
};

@group(0) @binding(0)
var<uniform> uniforms: PatchUniforms;
@group(0) @binding(1)
var<uniform> lut: DistanceLut;

fn morph_factor(dist: f32, level: u32) -> f32 {
    if level == 0u {
        return 0.0;
    }
    let low = lut.entries[level - 1u].x;
    let high = lut.entries[level].x;
    let a = (dist - low) / (high - low);
    return 1.0 - clamp(a / uniforms.morph_range, 0.0, 1.0);
}

@vertex
fn vs_patch(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;

    // Flat position on the leaf triangle's plane drives the morph
    // distance, then the morphed (u, v) is re-mapped and spherified.
    let flat_pos = in.a + in.r * in.pos.x + in.s * in.pos.y;
    let dist = distance(flat_pos, uniforms.camera_pos);
    let factor = morph_factor(dist, in.level);

    let uv = in.pos + in.morph * factor;
    let morphed = in.a + in.r * uv.x + in.s * uv.y;
    let unit = normalize(morphed);
    let surface = unit * uniforms.radius;

    let world = uniforms.model * vec4<f32>(surface, 1.0);
    out.clip_position = uniforms.view_proj * world;
    out.normal = unit;
    out.level = in.level;
    return out;
}

@fragment
fn fs_patch(in: VertexOutput) -> @location(0) vec4<f32> {
    // Simple headlight shading; materials and height displacement live in
    // the embedding application's shader.
    let light_dir = normalize(vec3<f32>(0.4, 0.8, 0.45));
    let ndotl = max(dot(normalize(in.normal), light_dir), 0.05);
    let base = vec3<f32>(0.35, 0.55, 0.4);
    return vec4<f32>(base * ndotl, 1.0);
}
"#;

/// Per-frame uniform block for the patch pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PatchUniforms {
    /// Planet model matrix in the local (origin-rebased) frame.
    pub model: [[f32; 4]; 4],
    /// Camera view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// Camera position in the planet's object space.
    pub camera_pos: [f32; 3],
    /// Planet radius.
    pub radius: f32,
    /// Fraction of each level's distance band over which the morph ramps.
    pub morph_range: f32,
    /// Std140 padding.
    pub _padding: [f32; 3],
}

/// The split-distance table padded to the uniform array stride.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DistanceLutUniform {
    entries: [[f32; 4]; MAX_LUT_LEVELS],
}

/// Instanced renderer for the patch reference grid.
///
/// The grid buffers are uploaded once at construction; the instance
/// buffer is replaced every frame from the triangulator's leaf list.
pub struct PatchRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    instance_buffer: Option<wgpu::Buffer>,
    instance_count: u32,
    uniform_buffer: wgpu::Buffer,
    lut_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PatchRenderer {
    const VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<PatchVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: 0,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 8,
                shader_location: 1,
            },
        ],
    };

    const INSTANCE_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<PatchInstance>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Uint32,
                offset: 0,
                shader_location: 2,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 4,
                shader_location: 3,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 16,
                shader_location: 4,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 28,
                shader_location: 5,
            },
        ],
    };

    /// Create the pipeline and upload the reference grid.
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        grid: &PatchGrid,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("patch-shader"),
            source: wgpu::ShaderSource::Wgsl(PATCH_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("patch-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("patch-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("patch-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_patch"),
                buffers: &[Self::VERTEX_LAYOUT, Self::INSTANCE_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_patch"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("patch-grid-vertices"),
            contents: bytemuck::cast_slice(grid.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("patch-grid-indices"),
            contents: bytemuck::cast_slice(grid.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("patch-uniforms"),
            size: std::mem::size_of::<PatchUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lut_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("patch-distance-lut"),
            size: std::mem::size_of::<DistanceLutUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("patch-bg"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lut_buffer.as_entire_binding(),
                },
            ],
        });

        log::info!(
            "Patch renderer initialized: {} grid vertices, {} triangles",
            grid.vertex_count(),
            grid.triangle_count()
        );

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: grid.indices().len() as u32,
            instance_buffer: None,
            instance_count: 0,
            uniform_buffer,
            lut_buffer,
            bind_group,
        }
    }

    /// Replace the instance buffer with this frame's leaf list.
    ///
    /// Destroy-and-recreate: the previous buffer is dropped and a new one
    /// sized to the list is created. Leaf counts swing widely between
    /// frames, so no growth amortization is attempted.
    pub fn bind_instances(&mut self, device: &wgpu::Device, instances: &[PatchInstance]) {
        self.instance_count = instances.len() as u32;
        if instances.is_empty() {
            self.instance_buffer = None;
            return;
        }
        self.instance_buffer = Some(device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("patch-instances"),
                contents: bytemuck::cast_slice(instances),
                usage: wgpu::BufferUsages::VERTEX,
            },
        ));
    }

    /// Copy the per-level split distances into the morph-blend uniform.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_LUT_LEVELS`] distances are supplied.
    pub fn upload_distance_lut(&self, queue: &wgpu::Queue, distances: &[f32]) {
        assert!(
            distances.len() <= MAX_LUT_LEVELS,
            "{} split distances exceed the LUT capacity of {MAX_LUT_LEVELS}",
            distances.len()
        );
        let mut uniform = DistanceLutUniform {
            entries: [[0.0; 4]; MAX_LUT_LEVELS],
        };
        for (entry, &distance) in uniform.entries.iter_mut().zip(distances) {
            entry[0] = distance;
        }
        queue.write_buffer(&self.lut_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Write the per-frame uniform block.
    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &PatchUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Issue the instanced draw. Assumes a render pass targeting the
    /// format given at construction is already bound.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        let Some(instance_buffer) = &self.instance_buffer else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, instance_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..self.instance_count);
    }

    /// Number of instances bound for the current frame.
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn create_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .ok()?;

            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                    ..Default::default()
                })
                .await
                .ok()
        })
    }

    fn sample_instances(radius: f32) -> Vec<PatchInstance> {
        let a = Vec3::new(0.0, 0.0, 1.0) * radius;
        let b = Vec3::new(0.0, 0.8, 0.6).normalize() * radius;
        let c = Vec3::new(0.75, 0.3, 0.6).normalize() * radius;
        vec![
            PatchInstance::from_corners(0, a, b, c),
            PatchInstance::from_corners(1, b, c, a),
        ]
    }

    #[test]
    fn test_instance_stride_matches_layout() {
        // The vertex attributes above hard-code the field offsets.
        assert_eq!(std::mem::size_of::<PatchInstance>(), 40);
        assert_eq!(std::mem::size_of::<PatchVertex>(), 16);
        assert_eq!(std::mem::size_of::<PatchUniforms>(), 160);
    }

    #[test]
    fn test_renderer_binds_and_clears_instances() {
        let Some((device, _queue)) = create_test_device() else {
            return;
        };
        let grid = PatchGrid::generate(4);
        let mut renderer = PatchRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb, &grid);
        assert_eq!(renderer.instance_count(), 0);

        renderer.bind_instances(&device, &sample_instances(1000.0));
        assert_eq!(renderer.instance_count(), 2);

        renderer.bind_instances(&device, &[]);
        assert_eq!(renderer.instance_count(), 0);
    }

    #[test]
    fn test_distance_lut_upload_accepts_full_table() {
        let Some((device, queue)) = create_test_device() else {
            return;
        };
        let grid = PatchGrid::generate(2);
        let renderer = PatchRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb, &grid);
        let distances: Vec<f32> = (0..MAX_LUT_LEVELS).map(|i| 1000.0 / (1 << i) as f32).collect();
        renderer.upload_distance_lut(&queue, &distances);
    }
}
