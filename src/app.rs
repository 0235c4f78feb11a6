use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowAttributes, WindowId},
};

use crate::config::RenderConfig;
use crate::gfx::{rendering::RenderEngine, scene::Scene};
use crate::input::InputCollector;

/// Window, render engine and demo scene driven by the winit event loop
pub struct TallowApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    config: RenderConfig,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    scene: Option<Scene>,
    input: InputCollector,
    last_frame: Instant,
    cursor_grabbed: bool,
    /// First fatal setup or surface error; returned from [`TallowApp::run`]
    error: Option<anyhow::Error>,
}

impl TallowApp {
    /// Creates the application. The window and GPU are set up on the first
    /// `resumed` event.
    ///
    /// # Errors
    /// Fails if the platform event loop cannot be created
    pub fn new(config: RenderConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                config,
                window: None,
                render_engine: None,
                scene: None,
                input: InputCollector::new(),
                last_frame: Instant::now(),
                cursor_grabbed: false,
                error: None,
            },
        })
    }

    /// Run the application (consumes self and starts the event loop)
    ///
    /// # Errors
    /// Window, device or scene setup failures and unrecoverable surface errors
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("Event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Poll);

        event_loop
            .run_app(&mut self.app_state)
            .context("Event loop terminated with an error")?;

        match self.app_state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let (width, height) = self.config.window_size;
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title("tallow")
                    .with_inner_size(LogicalSize::new(width, height)),
            )
            .context("Failed to create window")?;
        let window_handle = Arc::new(window);
        self.window = Some(window_handle.clone());

        let (width, height): (u32, u32) = window_handle.inner_size().into();
        let mut renderer =
            pollster::block_on(RenderEngine::new(window_handle, width, height, &self.config))?;

        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let mut scene =
            Scene::demo(self.config.clone(), aspect).context("Failed to build demo scene")?;
        scene.upload(renderer.gpu_mut());

        self.scene = Some(scene);
        self.render_engine = Some(renderer);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    /// Confines and hides the cursor while the right mouse button is held
    fn update_cursor_grab(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let wanted = self.input.is_mouse_down(MouseButton::Right);
        if wanted == self.cursor_grabbed {
            return;
        }

        let result = if wanted {
            window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(e) = result {
            log::debug!("cursor grab not available: {}", e);
        }
        window.set_cursor_visible(!wanted);
        self.cursor_grabbed = wanted;
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(render_engine), Some(scene)) = (self.render_engine.as_mut(), self.scene.as_mut())
        else {
            return;
        };

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let input = self.input.end_frame();
        scene.update(frame_time, &input);

        match render_engine.render_frame(|gpu| scene.render(gpu)) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow::anyhow!("GPU out of memory"));
            }
            Err(e) => log::warn!("frame dropped: {}", e),
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                }
            }
            WindowEvent::MouseInput { .. } => self.update_cursor_grab(),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(render_engine) = self.render_engine.as_mut() {
                    render_engine.resize(width, height);
                }
                if let Some(scene) = self.scene.as_mut() {
                    scene.resize(width, height);
                }
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        self.input.handle_device_event(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
