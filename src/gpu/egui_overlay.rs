//! Egui control panel drawn over the finished frame.
//!
//! Only present with the `egui` feature. Buttons do not touch the scene
//! directly; they report [`OverlayAction`]s for the app to apply.

use std::sync::Arc;
use winit::window::Window;

use crate::overlay::{music_label, toggle_label, OverlayAction};
use crate::state::TreeState;

const GOLD: egui::Color32 = egui::Color32::from_rgb(0xff, 0xd7, 0x00);
const PANEL_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(4, 16, 8, 200);

/// What the panel shows this frame.
#[derive(Debug, Clone, Copy)]
pub struct PanelState {
    pub tree: TreeState,
    pub music_playing: bool,
    pub photos: usize,
}

/// Tessellated output of one egui pass.
pub struct EguiFrameOutput {
    pub paint_jobs: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

pub struct EguiOverlay {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat, window: &Arc<Window>) -> Self {
        let ctx = egui::Context::default();

        let mut style = egui::Style::default();
        style.visuals = egui::Visuals::dark();
        style.visuals.window_shadow = egui::Shadow::NONE;
        style.visuals.popup_shadow = egui::Shadow::NONE;
        ctx.set_style(style);

        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window.as_ref(),
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let renderer = egui_wgpu::Renderer::new(device, output_format, None, 1, false);

        Self { ctx, state, renderer }
    }

    /// Feed a window event. Returns true when egui consumed it, in which
    /// case the camera should ignore it.
    pub fn on_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Whether the pointer is over a panel.
    pub fn wants_pointer(&self) -> bool {
        self.ctx.wants_pointer_input()
    }

    /// Run the panel for one frame and collect the clicked actions.
    pub fn run(&mut self, window: &Window, panel: PanelState) -> (EguiFrameOutput, Vec<OverlayAction>) {
        let raw_input = self.state.take_egui_input(window);
        let mut actions = Vec::new();
        let full_output = self.ctx.run(raw_input, |ctx| controls(ctx, panel, &mut actions));

        self.state.handle_platform_output(window, full_output.platform_output);
        let paint_jobs = self.ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        (
            EguiFrameOutput {
                paint_jobs,
                textures_delta: full_output.textures_delta,
                pixels_per_point: full_output.pixels_per_point,
            },
            actions,
        )
    }

    /// Upload textures and vertex data, then draw onto `target` over what
    /// is already there.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        output: &EguiFrameOutput,
        size_in_pixels: [u32; 2],
    ) {
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: output.pixels_per_point,
        };
        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        self.renderer
            .update_buffers(device, queue, encoder, &output.paint_jobs, &screen);

        {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer
                .render(&mut pass.forget_lifetime(), &output.paint_jobs, &screen);
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

fn controls(ctx: &egui::Context, panel: PanelState, actions: &mut Vec<OverlayAction>) {
    egui::Area::new(egui::Id::new("title"))
        .anchor(egui::Align2::CENTER_TOP, [0.0, 24.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new("Merry Christmas").size(32.0).color(GOLD));
        });

    egui::Area::new(egui::Id::new("controls"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -24.0])
        .show(ctx, |ui| {
            egui::Frame::new()
                .fill(PANEL_FILL)
                .corner_radius(8.0)
                .inner_margin(10.0)
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        let toggle = egui::Button::new(
                            egui::RichText::new(toggle_label(panel.tree)).size(18.0).color(GOLD),
                        );
                        if ui.add(toggle).clicked() {
                            actions.push(OverlayAction::ToggleState);
                        }

                        let note = if panel.music_playing { "♫" } else { "♪" };
                        if ui
                            .button(egui::RichText::new(note).size(18.0))
                            .on_hover_text(music_label(panel.music_playing))
                            .clicked()
                        {
                            actions.push(OverlayAction::ToggleMusic);
                        }

                        if ui
                            .button(egui::RichText::new("Upload Photos").size(18.0))
                            .on_hover_text("Or drop image files onto the window")
                            .clicked()
                        {
                            actions.push(OverlayAction::PickPhotos);
                        }

                        if panel.photos > 0 {
                            ui.label(format!("{} photos", panel.photos));
                        }
                    });
                });
        });
}
