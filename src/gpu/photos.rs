//! Unlit textured photo planes.
//!
//! Photos whose image has not arrived yet show a flat placeholder.

use std::collections::HashMap;

use glam::Mat4;

use super::geometry::{self, Vertex};
use super::meshes::{model_instance_layout, GpuMesh};
use super::{batch_bind_group, instance_buffer, uniform_buffer, BatchUniform, DEPTH_FORMAT, HDR_FORMAT};
use crate::scene::Scene;
use crate::textures::ImageData;
use crate::tree::PLACEHOLDER_COLOR;

struct PhotoTexture {
    // Kept alive for the bind group.
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

pub struct PhotoPass {
    pipeline: wgpu::RenderPipeline,
    plane: GpuMesh,
    instances: wgpu::Buffer,
    capacity: usize,
    batch_uniform: wgpu::Buffer,
    batch_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    placeholder: PhotoTexture,
    textures: HashMap<String, PhotoTexture>,
    /// URL shown by each photo this frame.
    urls: Vec<Option<String>>,
}

impl PhotoPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera_layout: &wgpu::BindGroupLayout,
        batch_layout: &wgpu::BindGroupLayout,
        scene: &Scene,
    ) -> Self {
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Photo Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Photo Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Photo Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::photos().into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Photo Pipeline Layout"),
            bind_group_layouts: &[camera_layout, batch_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Photo Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_photo"),
                buffers: &[Vertex::layout(), model_instance_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_photo"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
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

        let capacity = scene.config().counts.photos;
        let zeroed = vec![[0.0f32; 16]; capacity];
        let instances = instance_buffer(
            device,
            "Photo Instances",
            bytemuck::cast_slice(&zeroed),
            std::mem::size_of::<Mat4>() as u64,
        );
        let batch_uniform = uniform_buffer(device, "Photo Batch Uniform", &BatchUniform::identity());
        let batch_bind_group = batch_bind_group(device, batch_layout, &batch_uniform, "photos");

        let placeholder = create_photo_texture(
            device,
            queue,
            &texture_layout,
            &sampler,
            &ImageData::solid_hex(PLACEHOLDER_COLOR),
            "Photo Placeholder",
        );

        Self {
            pipeline,
            plane: GpuMesh::upload(device, &geometry::plane(1.0, 1.0), "Photo Plane"),
            instances,
            capacity,
            batch_uniform,
            batch_bind_group,
            texture_layout,
            sampler,
            placeholder,
            textures: HashMap::new(),
            urls: Vec::new(),
        }
    }

    /// Make a decoded image available to every photo showing `uri`.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, uri: &str, image: &ImageData) {
        let texture = create_photo_texture(device, queue, &self.texture_layout, &self.sampler, image, uri);
        self.textures.insert(uri.to_string(), texture);
    }

    pub fn has_texture(&self, uri: &str) -> bool {
        self.textures.contains_key(uri)
    }

    /// Release textures no photo can show any more. Returns the released URIs.
    pub fn retain(&mut self, urls: &[String]) -> Vec<String> {
        let released = stale_uris(self.textures.keys(), urls);
        for uri in &released {
            self.textures.remove(uri);
        }
        if !released.is_empty() {
            log::debug!("released {} photo textures", released.len());
        }
        released
    }

    pub fn prepare(&mut self, queue: &wgpu::Queue, scene: &Scene) {
        let group = BatchUniform::new(scene.group_matrix(), 0.0, 0.0);
        queue.write_buffer(&self.batch_uniform, 0, bytemuck::bytes_of(&group));

        let items = scene.photos.items();
        let n = items.len().min(self.capacity);
        let matrices: Vec<[f32; 16]> = items[..n].iter().map(|p| p.photo_matrix().to_cols_array()).collect();
        if n > 0 {
            queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(&matrices));
        }

        self.urls.clear();
        self.urls.extend((0..n).map(|i| scene.photos.url(i).map(str::to_string)));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.urls.is_empty() {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.batch_bind_group, &[]);
        pass.set_vertex_buffer(0, self.plane.vertices.slice(..));
        pass.set_vertex_buffer(1, self.instances.slice(..));
        pass.set_index_buffer(self.plane.indices.slice(..), wgpu::IndexFormat::Uint32);

        for (i, url) in self.urls.iter().enumerate() {
            let texture = url
                .as_deref()
                .and_then(|u| self.textures.get(u))
                .unwrap_or(&self.placeholder);
            pass.set_bind_group(2, &texture.bind_group, &[]);
            let i = i as u32;
            pass.draw_indexed(0..self.plane.index_count, 0, i..i + 1);
        }
    }
}

fn create_photo_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &ImageData,
    label: &str,
) -> PhotoTexture {
    let size = wgpu::Extent3d {
        width: image.width.max(1),
        height: image.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    PhotoTexture {
        _texture: texture,
        bind_group,
    }
}

/// Known URIs that are not in `urls`, sorted.
fn stale_uris<'a>(known: impl Iterator<Item = &'a String>, urls: &[String]) -> Vec<String> {
    let mut stale: Vec<String> = known.filter(|uri| !urls.contains(uri)).cloned().collect();
    stale.sort();
    stale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_uris() {
        let known = ["a".to_string(), "b".to_string(), "c".to_string()];
        let urls = ["c".to_string(), "d".to_string()];
        assert_eq!(stale_uris(known.iter(), &urls), vec!["a".to_string(), "b".to_string()]);
        assert!(stale_uris(known.iter(), &known).is_empty());
    }
}
