//! Post-processing chain.
//!
//! The scene renders into an HDR offscreen target. Bright parts are pulled
//! into a half-resolution buffer, blurred in two separable passes and added
//! back in the composite, which also tone maps and applies the vignette
//! while writing to the surface.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{DEPTH_FORMAT, HDR_FORMAT};
use crate::config::PostConfig;

/// Width of the bright-pass knee above the threshold.
const BLOOM_SMOOTHING: f32 = 0.025;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PostParams {
    /// threshold, smoothing, intensity, unused
    pub bloom: [f32; 4],
    /// vignette offset, vignette darkness, exposure, sRGB encode flag
    pub grade: [f32; 4],
    /// blur step in uv units
    pub direction: [f32; 4],
}

impl PostParams {
    pub fn new(config: &PostConfig, encode_srgb: bool) -> Self {
        Self {
            bloom: [config.bloom_threshold, BLOOM_SMOOTHING, config.bloom_intensity, 0.0],
            grade: [
                config.vignette_offset,
                config.vignette_darkness,
                config.exposure,
                if encode_srgb { 1.0 } else { 0.0 },
            ],
            direction: [0.0; 4],
        }
    }

    /// Same parameters, blurring along `(x, y)` uv steps.
    pub fn with_direction(mut self, x: f32, y: f32) -> Self {
        self.direction = [x, y, 0.0, 0.0];
        self
    }
}

/// Blur tap spacing in half-resolution texels.
pub fn blur_spread(radius: f32) -> f32 {
    1.0 + 4.0 * radius.max(0.0)
}

struct Target {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl Target {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width,
            height,
        }
    }
}

struct Sized {
    scene: Target,
    depth: Target,
    bloom_a: Target,
    bloom_b: Target,
    bright_bind_group: wgpu::BindGroup,
    blur_h_bind_group: wgpu::BindGroup,
    blur_v_bind_group: wgpu::BindGroup,
    composite_bind_group: wgpu::BindGroup,
}

pub struct PostChain {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    /// Bright pass and composite share one block; each blur direction has its own.
    params: wgpu::Buffer,
    blur_h_params: wgpu::Buffer,
    blur_v_params: wgpu::Buffer,
    base: PostParams,
    config: PostConfig,
    sized: Sized,
}

impl PostChain {
    pub fn new(
        device: &wgpu::Device,
        config: &PostConfig,
        width: u32,
        height: u32,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Bind Group Layout"),
            entries: &[
                texture_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(3),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::POST.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let fullscreen = |entry: &str, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let base = PostParams::new(config, !surface_format.is_srgb());
        let params_buffer = |label: &str| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&base),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        let params = params_buffer("Post Params");
        let blur_h_params = params_buffer("Blur H Params");
        let blur_v_params = params_buffer("Blur V Params");

        let bright_pipeline = fullscreen("fs_bright", HDR_FORMAT);
        let blur_pipeline = fullscreen("fs_blur", HDR_FORMAT);
        let composite_pipeline = fullscreen("fs_composite", surface_format);

        let sized = Sized::new(device, &layout, &sampler, [&params, &blur_h_params, &blur_v_params], width, height);

        Self {
            layout,
            sampler,
            bright_pipeline,
            blur_pipeline,
            composite_pipeline,
            params,
            blur_h_params,
            blur_v_params,
            base,
            config: *config,
            sized,
        }
    }

    /// Recreate the render targets after a resize.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.sized = Sized::new(
            device,
            &self.layout,
            &self.sampler,
            [&self.params, &self.blur_h_params, &self.blur_v_params],
            width,
            height,
        );
    }

    /// Where the scene pass draws.
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.sized.scene.view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.sized.depth.view
    }

    /// Size of the offscreen scene target.
    pub fn size(&self) -> (u32, u32) {
        (self.sized.scene.width, self.sized.scene.height)
    }

    /// Update the per-direction blur steps for the current target size.
    pub fn prepare(&self, queue: &wgpu::Queue) {
        let spread = blur_spread(self.config.bloom_radius);
        let (w, h) = (self.sized.bloom_a.width as f32, self.sized.bloom_a.height as f32);
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&self.base));
        queue.write_buffer(
            &self.blur_h_params,
            0,
            bytemuck::bytes_of(&self.base.with_direction(spread / w, 0.0)),
        );
        queue.write_buffer(
            &self.blur_v_params,
            0,
            bytemuck::bytes_of(&self.base.with_direction(0.0, spread / h)),
        );
    }

    /// Bloom, tone map and vignette the scene into `output`.
    pub fn run(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let s = &self.sized;
        fullscreen_pass(encoder, "Bright Pass", &s.bloom_a.view, &self.bright_pipeline, &s.bright_bind_group);
        fullscreen_pass(encoder, "Blur H Pass", &s.bloom_b.view, &self.blur_pipeline, &s.blur_h_bind_group);
        fullscreen_pass(encoder, "Blur V Pass", &s.bloom_a.view, &self.blur_pipeline, &s.blur_v_bind_group);
        fullscreen_pass(encoder, "Composite Pass", output, &self.composite_pipeline, &s.composite_bind_group);
    }
}

impl Sized {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        [params, blur_h, blur_v]: [&wgpu::Buffer; 3],
        width: u32,
        height: u32,
    ) -> Self {
        let scene = Target::new(device, "Scene HDR Texture", width, height, HDR_FORMAT);
        let depth = Target::new(device, "Scene Depth Texture", width, height, DEPTH_FORMAT);
        let bloom_a = Target::new(device, "Bloom A", width / 2, height / 2, HDR_FORMAT);
        let bloom_b = Target::new(device, "Bloom B", width / 2, height / 2, HDR_FORMAT);

        // A pass never samples the texture it renders to.
        let bind = |label: &str, src: &wgpu::TextureView, uniform: &wgpu::Buffer, aux: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(aux),
                    },
                ],
            })
        };

        let bright_bind_group = bind("Bright Bind Group", &scene.view, params, &bloom_b.view);
        let blur_h_bind_group = bind("Blur H Bind Group", &bloom_a.view, blur_h, &scene.view);
        let blur_v_bind_group = bind("Blur V Bind Group", &bloom_b.view, blur_v, &scene.view);
        let composite_bind_group = bind("Composite Bind Group", &scene.view, params, &bloom_a.view);

        Self {
            scene,
            depth,
            bloom_a,
            bloom_b,
            bright_bind_group,
            blur_h_bind_group,
            blur_v_bind_group,
            composite_bind_group,
        }
    }
}

fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}
