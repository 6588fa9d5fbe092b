use std::sync::Arc;
use std::time::{Duration, Instant};
use vista_engine::glam::{Mat4, Vec3};
use vista_engine::vista::config::EngineConfig;
use vista_engine::vista::render::{Extent2D, FrameStatus, ShaderSources};
use vista_engine::vista::resource::{ImageFileDecoder, ModelImporter, ObjImporter, TextureId};
use vista_engine::vista::{Error, GraphicsDevice, Renderer, Result};
use vista_engine::{engine_error, engine_info};
use vista_engine_renderer_vulkan::VulkanGraphicsDevice;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::cube;

const STATS_INTERVAL: Duration = Duration::from_secs(5);
const SPIN_SPEED: f32 = 0.5;

/// Window and renderer pair driven by the winit event loop
///
/// The renderer is declared first so the chain and its surface are
/// destroyed before the window they were created for.
pub struct DemoApp {
    renderer: Option<Renderer>,
    window: Option<Window>,
    config: EngineConfig,
    last_update: Instant,
    last_stats: Instant,
    error: Option<Error>,
}

impl DemoApp {
    pub fn new(config: EngineConfig) -> Self {
        let now = Instant::now();
        Self {
            renderer: None,
            window: None,
            config,
            last_update: now,
            last_stats: now,
            error: None,
        }
    }

    /// Tear down the renderer and window, then report the error that ended
    /// the event loop, if any
    pub fn finish(mut self) -> Result<()> {
        let error = self.error.take();
        drop(self);
        error.map_or(Ok(()), Err)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        engine_error!("vista::demo", "{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn create_renderer(&self, window: &Window) -> Result<Renderer> {
        let size = window.inner_size();
        let device = VulkanGraphicsDevice::new(window, &self.config)?;
        engine_info!("vista::demo", "Using adapter {}", device.adapter_name());

        let swapchain = device.create_swapchain(window, Extent2D::new(size.width, size.height))?;
        let device: Arc<dyn GraphicsDevice> = Arc::new(device);

        let shaders = ShaderSources::load(&self.config.shaders)?;
        let mut renderer = Renderer::new(
            device,
            Box::new(swapchain),
            &shaders,
            self.config.renderer.clone(),
            Box::new(ImageFileDecoder),
            self.config.assets.default_texture.as_deref(),
        )?;

        let model = match &self.config.assets.model {
            Some(path) => {
                let imported = ObjImporter.import(path)?;
                renderer.create_mesh_model(&imported, &self.config.assets.texture_dir)?
            }
            None => {
                let (vertices, indices) = cube::cube();
                renderer.add_mesh(&vertices, &indices, TextureId::DEFAULT)?
            }
        };
        // Modelling tools export Z-up
        renderer.set_model_transform(model, Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2))?;
        renderer.set_model_spin(model, Vec3::Z, SPIN_SPEED)?;

        Ok(renderer)
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let now = Instant::now();
        renderer.update(now - self.last_update);
        self.last_update = now;

        if let FrameStatus::Rebuilt = renderer.draw_frame()? {
            engine_info!("vista::demo", "Chain rebuilt at {:?}", renderer.extent());
        }

        if now - self.last_stats >= STATS_INTERVAL {
            let stats = renderer.stats();
            engine_info!(
                "vista::demo",
                "{:.1} fps ({:.2} ms/frame), {} frames, {} rebuilds",
                stats.fps(),
                stats.ms_per_frame(),
                stats.frame_count(),
                stats.rebuild_count()
            );
            self.last_stats = now;
        }
        Ok(())
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window.width, self.config.window.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => {
                self.fail(event_loop, Error::InitializationFailed(format!("window creation failed: {}", e)));
                return;
            }
        };

        match self.create_renderer(&window) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.window = Some(window);
                self.last_update = Instant::now();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(renderer) = &self.renderer {
                    if let Err(e) = renderer.wait_idle() {
                        engine_error!("vista::demo", "wait_idle on exit: {}", e);
                    }
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.request_resize(Extent2D::new(size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
