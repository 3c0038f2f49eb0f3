//! Platform layer: window, event loop and the per-frame spin of the viewer.
//!
//! The window owns one [`SceneRenderer`] over the wgpu backend. Every frame
//! the model is rotated about Y by `elapsed * spin` radians and redrawn.

use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::{Context, Result, anyhow};
use corelib::{camera::Camera, transform::Transform};
use log::{error, info, warn};
use pollster::FutureExt as _;
use renderer::{GpuContext, SceneRenderer};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

pub const DEFAULT_MODEL: &str = "Duck.glb";
pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 768;
/// Radians per second.
pub const DEFAULT_SPIN: f32 = 0.5;

/// Everything the viewer needs to start.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub model: PathBuf,
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
    pub spin: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from(DEFAULT_MODEL),
            backends: wgpu::Backends::all(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            spin: DEFAULT_SPIN,
        }
    }
}

impl ViewerConfig {
    /// Model rotation after `elapsed` seconds.
    pub fn world_at(&self, elapsed: f32) -> corelib::Mat4 {
        Transform::from_rotation_y(elapsed * self.spin).matrix()
    }
}

struct ViewerState {
    window: Arc<Window>,
    scene: SceneRenderer<GpuContext>,
    camera: Camera,
}

struct Viewer {
    config: ViewerConfig,
    state: Option<ViewerState>,
    start: Instant,
    error: Option<anyhow::Error>,
}

impl Viewer {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            state: None,
            start: Instant::now(),
            error: None,
        }
    }

    fn init(&self, event_loop: &ActiveEventLoop) -> Result<ViewerState> {
        let attributes = Window::default_attributes()
            .with_title(format!("glTF viewer - {}", self.config.model.display()))
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );
        info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let gpu = GpuContext::new(window.clone(), self.config.backends).block_on()?;
        let camera = Camera::viewer(gpu.aspect_ratio());
        let scene = SceneRenderer::load(gpu, &self.config.model, camera.view(), camera.projection())
            .with_context(|| format!("failed to load {}", self.config.model.display()))?;

        Ok(ViewerState {
            window,
            scene,
            camera,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        if self.error.is_none() {
            self.error = Some(err);
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let world = self.config.world_at(self.start.elapsed().as_secs_f32());

        state.scene.context_mut().begin_frame();
        if let Err(e) = state.scene.draw(world) {
            let err = anyhow!(e).context("draw failed");
            self.fail(event_loop, err);
            return;
        }
        match state.scene.context_mut().end_frame() {
            Ok(()) => {}
            Err(e) if GpuContext::is_surface_lost(&e) => {
                warn!("Surface lost ({e:?}), recreating");
                state.scene.context_mut().recreate_surface();
            }
            Err(wgpu::SurfaceError::Timeout) => warn!("Surface timeout, skipping frame"),
            Err(e) => self.fail(event_loop, anyhow!("surface error: {e:?}")),
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                self.start = Instant::now();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                info!("Resized: {}x{}", new_size.width, new_size.height);
                let gpu = state.scene.context_mut();
                gpu.resize(new_size.width, new_size.height);
                state.camera = state.camera.with_aspect(gpu.aspect_ratio());
                state.scene.set_projection(state.camera.projection());
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.scene.dispose();
        }
    }
}

/// Open the window and run until it is closed. Load and GPU failures are
/// returned once the event loop has stopped.
pub fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config);
    event_loop
        .run_app(&mut viewer)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match viewer.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{Mat4, Vec3};

    #[test]
    fn defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.model, PathBuf::from("Duck.glb"));
        assert_eq!((config.width, config.height), (1024, 768));
        assert_eq!(config.spin, 0.5);
    }

    #[test]
    fn world_spins_about_y() {
        let config = ViewerConfig::default();
        assert_eq!(config.world_at(0.0), Mat4::IDENTITY);

        let p = config.world_at(std::f32::consts::PI).transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        // y stays put
        let up = config.world_at(3.0).transform_point3(Vec3::Y);
        assert!((up - Vec3::Y).length() < 1e-5);
    }
}
