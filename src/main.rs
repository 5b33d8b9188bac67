//! Gravitational N-body Simulation
//!
//! Integrates a self-gravitating ensemble on the GPU and draws it every frame.
//! Pass a YAML config file as the first argument to override the defaults.

use nbody_renderer::{Camera, PointRenderer};
use nbody_simulation::{DeviceSetup, Simulation, SimulationConfig, SimulationError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const FRAME_WINDOW: usize = 60;

#[derive(Debug, Error)]
enum StartupError {
    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("surface creation failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("display device cannot present to this window")]
    UnsupportedSurface,
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    setup: DeviceSetup,

    simulation: Simulation,
    renderer: PointRenderer,
    camera: Camera,

    paused: bool,
    frame_times: VecDeque<f32>,
    last_frame_time: Instant,
}

impl GpuState {
    async fn new(window: Arc<Window>, sim_config: &SimulationConfig) -> Result<Self, StartupError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let setup = DeviceSetup::open(&instance, Some(&surface), sim_config).await?;
        let display = &setup.display;

        let surface_caps = surface.get_capabilities(&display.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(StartupError::UnsupportedSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .ok_or(StartupError::UnsupportedSurface)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&display.device, &config);

        let simulation = Simulation::initialize(&setup, sim_config).await?;

        let renderer = PointRenderer::new(&display.device, &config);
        log::info!("✓ Renderer initialized");

        let camera = Camera::new(config.width, config.height);

        Ok(Self {
            surface,
            config,
            setup,
            simulation,
            renderer,
            camera,
            paused: false,
            frame_times: VecDeque::with_capacity(FRAME_WINDOW),
            last_frame_time: Instant::now(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            let device = &self.setup.display.device;
            self.surface.configure(device, &self.config);
            self.renderer.resize(device, &self.config);
            self.camera.resize(new_size.width, new_size.height);
        }
    }

    fn update(&mut self) -> Result<(), SimulationError> {
        if self.paused {
            return Ok(());
        }
        self.simulation.step_frame()
    }

    /// Draw the last exposed state; returns (fps, average frame time in ms)
    fn render(&mut self) -> Result<(f32, f32), wgpu::SurfaceError> {
        let now = Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f32() * 1000.0;
        self.last_frame_time = now;

        if self.frame_times.len() == FRAME_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        let avg_frame_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        let fps = if avg_frame_time > 0.0 {
            1000.0 / avg_frame_time
        } else {
            0.0
        };

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let records = self.simulation.display();
        self.renderer.render(
            &self.setup.display.device,
            &self.setup.display.queue,
            &view,
            &self.camera,
            records.buffer,
            records.len,
        );

        output.present();
        Ok((fps, avg_frame_time))
    }
}

struct App {
    sim_config: SimulationConfig,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    failed: bool,
}

impl App {
    fn new(sim_config: SimulationConfig) -> Self {
        Self {
            sim_config,
            window: None,
            gpu_state: None,
            mouse_pressed: false,
            last_mouse_pos: None,
            failed: false,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), StartupError> {
        let window_attributes = Window::default_attributes()
            .with_title("N-body Simulation")
            .with_inner_size(winit::dpi::LogicalSize::new(1600, 900));

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let gpu_state = pollster::block_on(GpuState::new(window.clone(), &self.sim_config))?;

        self.window = Some(window);
        self.gpu_state = Some(gpu_state);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: &dyn std::error::Error) {
        log::error!("{}", error);
        self.failed = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start(event_loop) {
                self.fail(event_loop, &e);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    match key_code {
                        KeyCode::Space => {
                            gpu_state.paused = !gpu_state.paused;
                            let state = if gpu_state.paused { "paused" } else { "resumed" };
                            log::info!("Simulation {}", state);
                        }
                        KeyCode::KeyC => {
                            let (width, height) = (gpu_state.config.width, gpu_state.config.height);
                            gpu_state.camera = Camera::new(width, height);
                        }
                        _ => {}
                    }
                }
            }

            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Right || button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some(last_pos) = self.last_mouse_pos {
                        let delta_x = (position.x - last_pos.0) as f32;
                        let delta_y = (position.y - last_pos.1) as f32;

                        if let Some(gpu_state) = &mut self.gpu_state {
                            gpu_state.camera.rotate(delta_x * 0.005, delta_y * 0.005);
                        }
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_x, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
                };

                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.camera.zoom(scroll);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(gpu_state) = &mut self.gpu_state else {
                    return;
                };

                if let Err(e) = gpu_state.update() {
                    if e.is_fatal() {
                        self.fail(event_loop, &e);
                        return;
                    }
                    log::warn!("Skipping frame: {}", e);
                }

                if let Some(window) = &self.window {
                    match gpu_state.render() {
                        Ok((fps, frame_time)) => {
                            window.set_title(&format!(
                                "N-body - {:.0} FPS ({:.2}ms) - {} particles - {:?}",
                                fps,
                                frame_time,
                                gpu_state.simulation.particle_count(),
                                gpu_state.simulation.strategy()
                            ));
                        }
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            gpu_state.resize(window.inner_size())
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => log::warn!("Render error: {:?}", e),
                    }
                }
            }

            _ => {}
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu_state) = self.gpu_state.take() {
            gpu_state.simulation.shutdown();
        }
    }
}

fn load_config() -> Result<SimulationConfig, SimulationError> {
    match std::env::args_os().nth(1) {
        Some(path) => {
            let config = SimulationConfig::load(&path)?;
            log::info!("✓ Loaded config from {}", path.to_string_lossy());
            Ok(config)
        }
        None => Ok(SimulationConfig::default()),
    }
}

fn main() {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting N-body simulation...");

    let sim_config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Event loop creation failed: {}", e);
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(sim_config);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
        std::process::exit(1);
    }
    if app.failed {
        std::process::exit(1);
    }
}
