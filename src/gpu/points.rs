//! Point sprite passes: foliage, lights, snow and the sky.
//!
//! Each subsystem's static attributes are uploaded once; per frame only the
//! batch uniform (group transform, progress) changes. Sprites are instanced
//! six-vertex quads expanded in the vertex program.

use glam::Mat4;

use super::{batch_bind_group, instance_buffer, uniform_buffer, BatchUniform, DEPTH_FORMAT, HDR_FORMAT};
use crate::scene::Scene;
use crate::tree::{FoliageParticle, LightParticle, SkyStar, Snowflake};

const POINT_INSTANCE_STRIDE: u64 = 32;

/// Glow that only ever adds light.
const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

struct PointBatch {
    pipeline: wgpu::RenderPipeline,
    instances: wgpu::Buffer,
    count: u32,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PointBatch {
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instances.slice(..));
        pass.draw(0..6, 0..self.count);
    }
}

pub struct PointPass {
    foliage: PointBatch,
    lights: PointBatch,
    snow: PointBatch,
    sky: PointBatch,
}

impl PointPass {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        batch_layout: &wgpu::BindGroupLayout,
        scene: &Scene,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Point Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::points().into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Pipeline Layout"),
            bind_group_layouts: &[camera_layout, batch_layout],
            push_constant_ranges: &[],
        });

        let batch = |name: &str, bytes: &[u8], count: usize, blend: wgpu::BlendState| {
            let uniform = uniform_buffer(device, &format!("{} Batch Uniform", name), &BatchUniform::identity());
            PointBatch {
                pipeline: point_pipeline(device, &layout, &shader, name, blend),
                instances: instance_buffer(device, &format!("{} Instances", name), bytes, POINT_INSTANCE_STRIDE),
                count: count as u32,
                bind_group: batch_bind_group(device, batch_layout, &uniform, name),
                uniform,
            }
        };

        let foliage: &[FoliageParticle] = scene.foliage.particles();
        let lights: &[LightParticle] = scene.lights.particles();
        let snow: &[Snowflake] = scene.snow.flakes();
        let sky: &[SkyStar] = scene.sky.stars();

        Self {
            foliage: batch("foliage", bytemuck::cast_slice(foliage), foliage.len(), wgpu::BlendState::ALPHA_BLENDING),
            lights: batch("lights", bytemuck::cast_slice(lights), lights.len(), ADDITIVE),
            snow: batch("snow", bytemuck::cast_slice(snow), snow.len(), wgpu::BlendState::ALPHA_BLENDING),
            sky: batch("sky", bytemuck::cast_slice(sky), sky.len(), wgpu::BlendState::ALPHA_BLENDING),
        }
    }

    /// Write this frame's progress and transforms.
    pub fn prepare(&self, queue: &wgpu::Queue, scene: &Scene) {
        let group = scene.group_matrix();
        let writes = [
            (&self.foliage, BatchUniform::new(group, scene.foliage.progress(), 0.0)),
            (&self.lights, BatchUniform::new(group, scene.lights.progress(), 0.0)),
            (&self.snow, BatchUniform::new(Mat4::IDENTITY, 0.0, scene.snow.height())),
            (&self.sky, BatchUniform::new(Mat4::IDENTITY, 0.0, 0.0)),
        ];
        for (batch, uniform) in writes {
            queue.write_buffer(&batch.uniform, 0, bytemuck::bytes_of(&uniform));
        }
    }

    /// The star field, drawn first so everything else covers it.
    pub fn draw_sky(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.sky.draw(pass);
    }

    /// Foliage and snow blend over the meshes; the additive lights go last.
    pub fn draw_particles(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.foliage.draw(pass);
        self.snow.draw(pass);
        self.lights.draw(pass);
    }
}

fn point_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    name: &str,
    blend: wgpu::BlendState,
) -> wgpu::RenderPipeline {
    let vs = format!("vs_{}", name);
    let fs = format!("fs_{}", name);
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{} Pipeline", name)),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(&vs),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: POINT_INSTANCE_STRIDE,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(&fs),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        // Sprites test against the meshes but never occlude each other.
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
