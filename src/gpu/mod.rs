//! GPU renderer.
//!
//! Owns the surface, the device and one pass object per kind of drawable.
//! Every frame the CPU scene is mirrored into uniforms and instance buffers,
//! drawn into an HDR target and then post-processed onto the swapchain:
//!
//! 1. sky
//! 2. lit meshes (ornaments, ribbons, gifts, polaroid frames, star)
//! 3. photo planes
//! 4. foliage and snow sprites
//! 5. additive light sprites
//! 6. bloom, tone map, vignette
//! 7. the egui panel, if enabled

pub mod camera;
pub mod geometry;
pub mod meshes;
pub mod photos;
pub mod points;
pub mod post;
pub mod shaders;

#[cfg(feature = "egui")]
pub mod egui_overlay;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

pub use camera::{CameraUniform, OrbitCamera};
pub use meshes::MeshPass;
pub use photos::PhotoPass;
pub use points::PointPass;
pub use post::{PostChain, PostParams};

use crate::config::{RenderConfig, SceneConfig};
use crate::error::GpuError;
use crate::scene::Scene;
use crate::textures::ImageData;
use crate::time::FrameTime;
use crate::tree::srgb_to_linear;

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Tessellated egui output handed to [`Renderer::render`].
#[cfg(feature = "egui")]
pub type UiFrame = egui_overlay::EguiFrameOutput;

/// Without egui there is never anything to draw on top.
#[cfg(not(feature = "egui"))]
pub enum UiFrame {}

/// Per-batch transform and animation scalars, bind group 1 binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct BatchUniform {
    pub model: [[f32; 4]; 4],
    /// x: morph progress, y: snow box height.
    pub params: [f32; 4],
}

impl BatchUniform {
    pub fn identity() -> Self {
        Self::new(Mat4::IDENTITY, 0.0, 0.0)
    }

    pub fn new(model: Mat4, progress: f32, height: f32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            params: [progress, height, 0.0, 0.0],
        }
    }
}

pub(crate) fn uniform_buffer<T: Pod>(device: &wgpu::Device, label: &str, value: &T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Vertex buffer for per-instance data. Empty batches still get one zeroed
/// element so the buffer is valid; they are drawn zero times.
pub(crate) fn instance_buffer(device: &wgpu::Device, label: &str, bytes: &[u8], stride: u64) -> wgpu::Buffer {
    let padding;
    let contents = if bytes.is_empty() {
        padding = vec![0u8; stride as usize];
        &padding[..]
    } else {
        bytes
    };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    })
}

pub(crate) fn batch_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{} Batch Bind Group", label)),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }],
    })
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Offscreen size for a surface of `physical` pixels: the logical size times
/// the clamped device pixel ratio.
pub fn render_size(physical: (u32, u32), scale_factor: f64, render: &RenderConfig) -> (u32, u32) {
    let scale = scale_factor.max(1e-3) as f32;
    let ratio = pixel_ratio(scale_factor, render);
    let dim = |p: u32| ((p as f32 / scale * ratio).round() as u32).max(1);
    (dim(physical.0), dim(physical.1))
}

pub fn pixel_ratio(scale_factor: f64, render: &RenderConfig) -> f32 {
    (scale_factor as f32).clamp(render.min_pixel_ratio, render.max_pixel_ratio)
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    scale_factor: f64,
    render: RenderConfig,
    clear_color: wgpu::Color,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    points: PointPass,
    meshes: MeshPass,
    photos: PhotoPass,
    post: PostChain,
    #[cfg(feature = "egui")]
    pub egui: egui_overlay::EguiOverlay,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, scene: &Scene, scene_config: &SceneConfig) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let scale_factor = window.scale_factor();

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
            .ok_or(GpuError::NoAdapter)?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoSurfaceFormat)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        if !surface_format.is_srgb() {
            log::debug!("surface {:?} is linear; composite encodes sRGB itself", surface_format);
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera_layout = uniform_layout(&device, "Camera Bind Group Layout");
        let batch_layout = uniform_layout(&device, "Batch Bind Group Layout");

        let camera = OrbitCamera::new(&scene_config.camera);
        let camera_buffer = uniform_buffer(
            &device,
            "Camera Uniform",
            &camera.uniform(config.width, config.height, scene_config.render.point_scale, 0.0, 0.0),
        );
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let points = PointPass::new(&device, &camera_layout, &batch_layout, scene);
        let meshes = MeshPass::new(&device, &camera_layout, scene);
        let photos = PhotoPass::new(&device, &queue, &camera_layout, &batch_layout, scene);

        let (width, height) = render_size((config.width, config.height), scale_factor, &scene_config.render);
        let post = PostChain::new(&device, &scene_config.post, width, height, surface_format);

        let bg = scene_config.post.background;
        let clear_color = wgpu::Color {
            r: srgb_to_linear(bg.x) as f64,
            g: srgb_to_linear(bg.y) as f64,
            b: srgb_to_linear(bg.z) as f64,
            a: 1.0,
        };

        #[cfg(feature = "egui")]
        let egui = egui_overlay::EguiOverlay::new(&device, surface_format, &window);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            scale_factor,
            render: scene_config.render,
            clear_color,
            camera_buffer,
            camera_bind_group,
            points,
            meshes,
            photos,
            post,
            #[cfg(feature = "egui")]
            egui,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            let (w, h) = render_size((new_size.width, new_size.height), self.scale_factor, &self.render);
            self.post.resize(&self.device, w, h);
            log::debug!(
                "surface {}x{}, scene target {}x{}",
                new_size.width,
                new_size.height,
                w,
                h
            );
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
        self.resize(winit::dpi::PhysicalSize::new(self.config.width, self.config.height));
    }

    /// Reconfigure the surface at its current size after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Make a decoded photo available to every polaroid showing `uri`.
    pub fn upload_photo(&mut self, uri: &str, image: &ImageData) {
        self.photos.upload(&self.device, &self.queue, uri, image);
    }

    pub fn has_photo(&self, uri: &str) -> bool {
        self.photos.has_texture(uri)
    }

    /// Drop photo textures that are no longer in `urls`.
    pub fn retain_photos(&mut self, urls: &[String]) -> Vec<String> {
        self.photos.retain(urls)
    }

    /// Draw one frame of `scene` seen from `camera`.
    pub fn render(
        &mut self,
        scene: &Scene,
        camera: &OrbitCamera,
        frame: FrameTime,
        ui: Option<&UiFrame>,
    ) -> Result<(), wgpu::SurfaceError> {
        let (width, height) = self.post.size();
        let ratio = pixel_ratio(self.scale_factor, &self.render);
        let uniform = camera.uniform(width, height, self.render.point_scale * ratio, frame.elapsed, frame.delta);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));
        self.points.prepare(&self.queue, scene);
        self.meshes.prepare(&self.queue, scene);
        self.photos.prepare(&self.queue, scene);
        self.post.prepare(&self.queue);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.post.scene_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.post.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            self.points.draw_sky(&mut pass);
            self.meshes.draw(&mut pass);
            self.photos.draw(&mut pass);
            self.points.draw_particles(&mut pass);
        }

        self.post.run(&mut encoder, &view);

        #[cfg(feature = "egui")]
        {
            if let Some(ui) = ui {
                self.egui.render(
                    &self.device,
                    &self.queue,
                    &mut encoder,
                    &view,
                    ui,
                    [self.config.width, self.config.height],
                );
            }
        }
        #[cfg(not(feature = "egui"))]
        let _ = ui;

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
