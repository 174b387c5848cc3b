use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use glam::Vec3;
use lumen_render::{CameraMotion, FlyCamera, RendererConfig, SceneOptions, TextureSlot, build_scene};
use lumen_render_wgpu::{WgpuRenderer, WgpuWindow};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const BASE_SPEED: f32 = 10.0;

#[derive(Parser)]
#[command(name = "lumen-viewer", about = "Lumen scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Window width in pixels
    #[arg(long, default_value = "800")]
    width: u32,

    /// Window height in pixels
    #[arg(long, default_value = "600")]
    height: u32,

    /// Wavefront OBJ model to show instead of the cube
    #[arg(long)]
    mesh: Option<PathBuf>,

    /// Effect manifest (JSON) for the model
    #[arg(long)]
    effect: Option<PathBuf>,

    /// Technique of the effect to use; the first one when omitted
    #[arg(long)]
    technique: Option<String>,

    #[arg(long)]
    diffuse: Option<PathBuf>,

    #[arg(long)]
    normal: Option<PathBuf>,

    #[arg(long)]
    specular: Option<PathBuf>,

    #[arg(long)]
    gloss: Option<PathBuf>,
}

impl Cli {
    fn scene_options(&self) -> SceneOptions {
        let textures = [
            (TextureSlot::Diffuse, &self.diffuse),
            (TextureSlot::Normal, &self.normal),
            (TextureSlot::Specular, &self.specular),
            (TextureSlot::Gloss, &self.gloss),
        ]
        .into_iter()
        .filter_map(|(slot, path)| path.clone().map(|p| (slot, p)))
        .collect();
        SceneOptions {
            mesh: self.mesh.clone(),
            effect: self.effect.clone(),
            technique: self.technique.clone(),
            textures,
            ..SceneOptions::default()
        }
    }
}

/// Input state between frames.
#[derive(Default)]
struct InputState {
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
}

impl InputState {
    fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.keys_held.contains(&positive) {
            value += 1.0;
        }
        if self.keys_held.contains(&negative) {
            value -= 1.0;
        }
        value
    }

    fn motion(&self) -> CameraMotion {
        CameraMotion {
            forward: self.axis(KeyCode::KeyW, KeyCode::KeyS),
            right: self.axis(KeyCode::KeyD, KeyCode::KeyA),
            up: self.axis(KeyCode::Space, KeyCode::ControlLeft),
        }
    }

    fn speed(&self) -> f32 {
        if self.keys_held.contains(&KeyCode::ShiftLeft) {
            BASE_SPEED * 3.0
        } else {
            BASE_SPEED
        }
    }
}

struct ViewerApp {
    size: PhysicalSize<u32>,
    options: SceneOptions,
    // Dropped before the window it presents to.
    renderer: Option<WgpuRenderer<FlyCamera>>,
    window: Option<Arc<Window>>,
    input: InputState,
    last_frame: Instant,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(size: PhysicalSize<u32>, options: SceneOptions) -> Self {
        Self {
            size,
            options,
            renderer: None,
            window: None,
            input: InputState::default(),
            last_frame: Instant::now(),
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Lumen")
            .with_inner_size(self.size)
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(attrs)?);
        let surface = WgpuWindow::new(window.clone());

        let size = window.inner_size();
        let aspect = size.width as f32 / size.height.max(1) as f32;
        let camera = FlyCamera::new(Vec3::new(0.0, 0.0, 10.0), 45.0, aspect);
        let mut renderer = WgpuRenderer::initialize(&surface, camera, RendererConfig::default())?;
        build_scene(&mut renderer, &self.options)?;

        tracing::info!("F2: sampler filter | F3: animation | RMB: look | WASD/Space/Ctrl: move");
        self.renderer = Some(renderer);
        self.window = Some(window);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode, pressed: bool) {
        if pressed {
            self.input.keys_held.insert(key);
        } else {
            self.input.keys_held.remove(&key);
        }
        if !pressed {
            return;
        }

        let Some(renderer) = &mut self.renderer else {
            return;
        };
        match key {
            KeyCode::F2 => {
                let filter = renderer.cycle_filter_mode();
                tracing::info!(%filter, "sampler filter changed");
            }
            KeyCode::F3 => {
                let animating = renderer.toggle_animation();
                tracing::info!(animating, "animation toggled");
            }
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        let Some(renderer) = &mut self.renderer else {
            return;
        };
        let camera = renderer.camera_mut();
        camera.speed = self.input.speed();
        camera.set_motion(self.input.motion());
        renderer.update(dt);
        renderer.render();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            tracing::error!(error = %format!("{err:#}"), "viewer failed to start");
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.handle_key(event_loop, key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.input.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!self.input.mouse_captured);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.input.mouse_captured {
                if let Some(renderer) = &mut self.renderer {
                    renderer.camera_mut().look(delta.0 as f32, delta.1 as f32);
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.renderer = None;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("lumen-viewer starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(
        PhysicalSize::new(cli.width, cli.height),
        cli.scene_options(),
    );
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
