//! Window and render loop.
//!
//! The [`App`] owns the CPU scene and, once the window exists, the
//! [`Renderer`]. Each redraw reads input, applies overlay actions, advances
//! the scene and the camera, streams photo textures in and draws.

use std::path::PathBuf;
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::audio;
use crate::config::SceneConfig;
use crate::error::AppError;
use crate::gpu::{OrbitCamera, Renderer, UiFrame};
use crate::input::{Input, KeyCode};
use crate::overlay::{is_image_path, Overlay, OverlayAction};
use crate::scene::Scene;
use crate::state::TreeState;
use crate::textures::TextureLoader;
use crate::time::FrameClock;

/// Seconds between fps log lines.
const FPS_LOG_INTERVAL: f32 = 5.0;

/// How the viewer starts.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: SceneConfig,
    pub initial: TreeState,
    /// Preloaded user image URIs, in order.
    pub images: Vec<String>,
}

/// Open the window and run until it closes.
pub fn run(options: RunOptions) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(options);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub struct App {
    scene: Scene,
    overlay: Overlay,
    camera: OrbitCamera,
    clock: FrameClock,
    input: Input,
    loader: Option<TextureLoader>,
    /// Photo list generation whose URLs have been requested.
    requested_generation: Option<u64>,
    dropped: Vec<PathBuf>,
    last_fps_log: f32,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    error: Option<AppError>,
}

impl App {
    pub fn new(options: RunOptions) -> Self {
        let RunOptions { config, initial, images } = options;
        let mut scene = Scene::from_config(config, initial);
        let mut overlay = Overlay::new(audio::open(&scene.config().audio));
        overlay.show_images(&mut scene, images);

        let camera = OrbitCamera::new(&scene.config().camera);

        let loader = match TextureLoader::spawn() {
            Ok(loader) => Some(loader),
            Err(e) => {
                log::warn!("texture loader unavailable ({}), photos stay blank", e);
                None
            }
        };

        Self {
            scene,
            overlay,
            camera,
            clock: FrameClock::new(),
            input: Input::new(),
            loader,
            requested_generation: None,
            dropped: Vec::new(),
            last_fps_log: 0.0,
            window: None,
            renderer: None,
            error: None,
        }
    }

    fn apply(&mut self, action: OverlayAction) {
        self.overlay.apply(action, &mut self.scene);
    }

    fn handle_keys(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.key_pressed(KeyCode::Escape) {
            event_loop.exit();
        }
        if self.input.key_pressed(KeyCode::Space) {
            self.apply(OverlayAction::ToggleState);
        }
        if self.input.key_pressed(KeyCode::M) {
            self.apply(OverlayAction::ToggleMusic);
        }
        if self.input.key_pressed(KeyCode::U) {
            self.apply(OverlayAction::PickPhotos);
        }
    }

    fn upload_dropped(&mut self) {
        if self.dropped.is_empty() {
            return;
        }
        let paths: Vec<PathBuf> = self.dropped.drain(..).filter(|p| is_image_path(p)).collect();
        let n = self.overlay.upload(&mut self.scene, paths);
        log::info!("{} dropped photos", n);
    }

    /// Request textures for a new photo list and upload whatever finished loading.
    fn sync_photos(&mut self) {
        let (Some(renderer), Some(loader)) = (self.renderer.as_mut(), self.loader.as_mut()) else {
            return;
        };

        let generation = self.scene.photo_generation();
        if self.requested_generation != Some(generation) {
            let urls = self.scene.photos.active_urls().to_vec();
            for url in &urls {
                if !renderer.has_photo(url) {
                    loader.request(url);
                }
            }
            for uri in renderer.retain_photos(&urls) {
                loader.forget(&uri);
            }
            self.requested_generation = Some(generation);
        }

        for (uri, image) in loader.poll() {
            renderer.upload_photo(&uri, &image);
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };

        let frame = self.clock.tick();
        self.handle_keys(event_loop);
        self.upload_dropped();

        let height = window.inner_size().height as f32;
        #[cfg(feature = "egui")]
        let pointer_on_panel = self.renderer.as_ref().is_some_and(|r| r.egui.wants_pointer());
        #[cfg(not(feature = "egui"))]
        let pointer_on_panel = false;
        if !pointer_on_panel {
            self.camera.drag(self.input.drag_delta(), height);
        }
        let scroll = self.input.scroll_delta();
        if scroll != 0.0 {
            self.camera.zoom(scroll);
        }

        let ui = self.run_ui(&window);

        self.scene.update(frame);
        self.camera.update(frame.delta, self.scene.auto_rotate_speed());
        self.sync_photos();

        if let Some(renderer) = self.renderer.as_mut() {
            match renderer.render(&self.scene, &self.camera, frame, ui.as_ref()) {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::debug!("surface lost, reconfiguring");
                    renderer.reconfigure();
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("GPU out of memory");
                    event_loop.exit();
                }
                Err(e) => log::warn!("render error: {:?}", e),
            }
        }

        if frame.elapsed - self.last_fps_log >= FPS_LOG_INTERVAL {
            self.last_fps_log = frame.elapsed;
            log::debug!("{:.1} fps, state {:?}", self.clock.fps(), self.scene.state());
        }

        self.input.begin_frame();
        window.request_redraw();
    }

    #[cfg(feature = "egui")]
    fn run_ui(&mut self, window: &Window) -> Option<UiFrame> {
        use crate::gpu::egui_overlay::PanelState;

        let renderer = self.renderer.as_mut()?;
        let panel = PanelState {
            tree: self.scene.state(),
            music_playing: self.scene.store().music_playing(),
            photos: self.scene.store().user_images().len(),
        };
        let (output, actions) = renderer.egui.run(window, panel);
        for action in actions {
            self.apply(action);
        }
        Some(output)
    }

    #[cfg(not(feature = "egui"))]
    fn run_ui(&mut self, _window: &Window) -> Option<UiFrame> {
        None
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("Evergreen")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.error = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        let config = self.scene.config().clone();
        match pollster::block_on(Renderer::new(Arc::clone(&window), &self.scene, &config)) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.window = Some(Arc::clone(&window));
                window.request_redraw();
            }
            Err(e) => {
                log::error!("{}", e);
                self.error = Some(e.into());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        #[cfg(feature = "egui")]
        let consumed = match (&self.window, self.renderer.as_mut()) {
            (Some(window), Some(renderer)) => renderer.egui.on_window_event(window, &event),
            _ => false,
        };
        #[cfg(not(feature = "egui"))]
        let consumed = false;

        // Releases always reach the input state so a drag never sticks.
        let release = matches!(
            event,
            WindowEvent::MouseInput {
                state: ElementState::Released,
                ..
            }
        );
        if !consumed || release {
            self.input.handle_event(&event);
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(physical_size);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.set_scale_factor(scale_factor);
                }
            }
            WindowEvent::DroppedFile(path) => {
                self.dropped.push(path);
            }
            WindowEvent::Occluded(occluded) => {
                self.clock.set_paused(occluded);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }
}
