//! Lit instanced meshes: ornaments, ribbons, gifts, polaroid frames and the star.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use super::geometry::{self, Extrude, Mesh, Vertex};
use super::{instance_buffer, uniform_buffer, BatchUniform, DEPTH_FORMAT, HDR_FORMAT};
use crate::scene::{Lighting, MeshBatches, Scene};
use crate::tree::{star_outline, MeshInstance, SEGMENT_SIZE};

const MESH_INSTANCE_STRIDE: u64 = std::mem::size_of::<MeshInstance>() as u64;

const STAR_EXTRUDE: Extrude = Extrude {
    depth: 0.02,
    bevel_thickness: 0.05,
    bevel_size: 0.05,
    bevel_segments: 2,
};

/// Lights in world space, bind group 1 binding 1.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightingUniform {
    ambient: [f32; 4],
    spot_position: [f32; 4],
    spot_direction: [f32; 4],
    spot_color: [f32; 4],
    fill_position: [f32; 4],
    fill_color: [f32; 4],
    star_position: [f32; 4],
    star_color: [f32; 4],
    env_sky: [f32; 4],
    env_ground: [f32; 4],
}

impl From<&Lighting> for LightingUniform {
    fn from(l: &Lighting) -> Self {
        let spot = &l.spot;
        let direction = (spot.position - spot.target).normalize_or_zero();
        let cone_cos = spot.angle.cos();
        let inner_cos = (spot.angle * (1.0 - spot.penumbra)).cos();
        Self {
            ambient: l.ambient.extend(0.0).to_array(),
            spot_position: spot.position.extend(spot.intensity).to_array(),
            spot_direction: direction.extend(cone_cos).to_array(),
            spot_color: spot.color.extend(inner_cos).to_array(),
            fill_position: l.fill.position.extend(l.fill.intensity).to_array(),
            fill_color: l.fill.color.extend(l.fill.distance).to_array(),
            star_position: l.star.position.extend(l.star.intensity).to_array(),
            star_color: l.star.color.extend(l.star.distance).to_array(),
            env_sky: l.env_sky.extend(0.0).to_array(),
            env_ground: l.env_ground.extend(0.0).to_array(),
        }
    }
}

/// Uploaded geometry.
pub struct GpuMesh {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertices", label)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Indices", label)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
        }
    }
}

struct MeshBatch {
    mesh: GpuMesh,
    instances: wgpu::Buffer,
    capacity: usize,
    count: u32,
}

impl MeshBatch {
    fn new(device: &wgpu::Device, mesh: &Mesh, capacity: usize, label: &str) -> Self {
        let zeroed = vec![MeshInstance::zeroed(); capacity];
        Self {
            mesh: GpuMesh::upload(device, mesh, label),
            instances: instance_buffer(
                device,
                &format!("{} Instances", label),
                bytemuck::cast_slice(&zeroed),
                MESH_INSTANCE_STRIDE,
            ),
            capacity,
            count: 0,
        }
    }

    fn write(&mut self, queue: &wgpu::Queue, instances: &[MeshInstance]) {
        let n = instances.len().min(self.capacity);
        if n > 0 {
            queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(&instances[..n]));
        }
        self.count = n as u32;
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.count == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.mesh.vertices.slice(..));
        pass.set_vertex_buffer(1, self.instances.slice(..));
        pass.set_index_buffer(self.mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.mesh.index_count, 0, 0..self.count);
    }
}

pub struct MeshPass {
    pipeline: wgpu::RenderPipeline,
    batch_uniform: wgpu::Buffer,
    lighting_uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    ornaments: MeshBatch,
    ribbons: MeshBatch,
    gifts: MeshBatch,
    frames: MeshBatch,
    star: MeshBatch,
    scratch: MeshBatches,
}

impl MeshPass {
    pub fn new(device: &wgpu::Device, camera_layout: &wgpu::BindGroupLayout, scene: &Scene) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let batch_uniform = uniform_buffer(device, "Mesh Batch Uniform", &BatchUniform::identity());
        let lighting_uniform = uniform_buffer(device, "Lighting Uniform", &LightingUniform::from(&scene.lighting()));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: batch_uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_uniform.as_entire_binding(),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::meshes().into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[camera_layout, &bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_mesh"),
                buffers: &[Vertex::layout(), mesh_instance_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_mesh"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Back faces are resolved per instance in the fragment program.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let counts = scene.config().counts;
        let mut star = geometry::extrude(&star_outline(), &STAR_EXTRUDE);
        star.center();

        Self {
            pipeline,
            batch_uniform,
            lighting_uniform,
            bind_group,
            ornaments: MeshBatch::new(device, &geometry::sphere(1.0, 32, 32), counts.ornaments, "Ornament"),
            ribbons: MeshBatch::new(device, &geometry::cuboid(SEGMENT_SIZE), counts.ribbon_segments * 2, "Ribbon"),
            gifts: MeshBatch::new(device, &geometry::cuboid(Vec3::ONE), counts.gifts, "Gift"),
            frames: MeshBatch::new(device, &geometry::plane(1.0, 1.0), counts.photos, "Frame"),
            star: MeshBatch::new(device, &star, 1, "Star"),
            scratch: MeshBatches::default(),
        }
    }

    pub fn prepare(&mut self, queue: &wgpu::Queue, scene: &Scene) {
        let group = BatchUniform::new(scene.group_matrix(), 0.0, 0.0);
        queue.write_buffer(&self.batch_uniform, 0, bytemuck::bytes_of(&group));
        let lighting = LightingUniform::from(&scene.lighting());
        queue.write_buffer(&self.lighting_uniform, 0, bytemuck::bytes_of(&lighting));

        scene.write_meshes(&mut self.scratch);
        self.ornaments.write(queue, &self.scratch.ornaments);
        self.ribbons.write(queue, &self.scratch.ribbons);
        self.gifts.write(queue, &self.scratch.gifts);
        self.frames.write(queue, &self.scratch.frames);
        self.star.write(queue, &self.scratch.star);
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.bind_group, &[]);
        for batch in [&self.ornaments, &self.ribbons, &self.gifts, &self.frames, &self.star] {
            batch.draw(pass);
        }
    }
}

/// Per-instance attributes at locations 3..=12.
fn mesh_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 10] = wgpu::vertex_attr_array![
        3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4,
        7 => Float32x4, 8 => Float32x4, 9 => Float32x4,
        10 => Float32x4, 11 => Float32x4, 12 => Float32x4
    ];
    wgpu::VertexBufferLayout {
        array_stride: MESH_INSTANCE_STRIDE,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}

/// Model matrix only, for passes that ignore the rest of [`MeshInstance`].
pub fn model_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Mat4>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}
