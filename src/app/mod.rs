mod egui_host;
mod input;
mod timing;

pub use egui_host::EguiFrameOutput;

use crate::assets::AssetManager;
use crate::config::{ConfigError, ViewerConfig};
use crate::preferences::{PreferenceStore, Preferences};
use crate::render::{viewport, RenderContext, RenderError};
use crate::ui::{UiCommand, UiState};
use crate::viewer::{PointerButton, PointerOutcome, Viewer};
use egui_host::EguiHost;
use glam::Vec2;
use input::{InputAction, InputState};
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

const PIXELS_PER_SCROLL_LINE: f32 = 50.0;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub struct App {
    config: ViewerConfig,
    viewer: Viewer,
    preferences: PreferenceStore,
    ui: UiState,
    input: InputState,
    window: Option<Arc<Window>>,
    egui: Option<EguiHost>,
    render: Option<RenderContext>,
    timing: FrameTiming,
    /// Last cursor position in logical pixels.
    cursor: Option<Vec2>,
    /// Button whose press started the gizmo or camera gesture in progress.
    captured_button: Option<MouseButton>,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    close_requested: bool,
    failure: Option<AppError>,
}

impl App {
    fn new(config: ViewerConfig, viewer: Viewer, preferences: PreferenceStore) -> Self {
        let now = Instant::now();
        let target_frame_duration = frame_duration_for(config.target_fps);
        Self {
            timing: FrameTiming::new(config.window.title.clone(), now),
            config,
            viewer,
            preferences,
            ui: UiState::new(),
            input: InputState::default(),
            window: None,
            egui: None,
            render: None,
            cursor: None,
            captured_button: None,
            target_frame_duration,
            next_frame_time: now,
            close_requested: false,
            failure: None,
        }
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let render = RenderContext::new(Arc::clone(&window))?;
        self.egui = Some(EguiHost::new(&window));
        self.render = Some(render);
        self.update_target_frame_duration(&window);
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{err}");
        self.failure = Some(err);
        self.close_requested = true;
        event_loop.exit();
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = frame_duration_for(self.config.target_fps);
        if let Some(millihz) = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz())
        {
            let hz = millihz as f32 / 1000.0;
            if hz > 1.0 {
                target = Duration::from_secs_f32(1.0 / hz);
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    /// Logical size of the drawable area; the viewport fills the window.
    fn viewport_size(&self) -> Vec2 {
        let Some(window) = &self.window else {
            return Vec2::new(
                self.config.window.width.max(1) as f32,
                self.config.window.height.max(1) as f32,
            );
        };
        let size = window.inner_size();
        let scale = window.scale_factor() as f32;
        Vec2::new(size.width.max(1) as f32, size.height.max(1) as f32) / scale
    }

    fn dispatch(&mut self, command: UiCommand) {
        log::debug!("ui command {:?}", command);
        self.ui.handle(&command);
        let theme_before = self.viewer.theme();
        self.viewer.apply(&command);
        let theme = self.viewer.theme();
        if theme != theme_before {
            log::info!("theme set to {}", theme.label());
            if let Err(err) = self.preferences.save(&Preferences { theme }) {
                log::warn!("{err}");
            }
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &winit::event::KeyEvent) {
        let pressed = event.state == ElementState::Pressed;
        match self
            .input
            .handle_key(event.physical_key, pressed, event.repeat)
        {
            InputAction::Quit => {
                self.close_requested = true;
                event_loop.exit();
            }
            InputAction::Zoom(lines) => self.viewer.scroll(lines),
            InputAction::Command(command) => self.dispatch(command),
            InputAction::None => {}
        }
    }

    /// The first button to start a gesture owns the pointer until it is
    /// released; other buttons are ignored meanwhile.
    fn handle_pointer_button(&mut self, button: MouseButton, state: ElementState) {
        let pointer_button = match button {
            MouseButton::Left => PointerButton::Primary,
            MouseButton::Right | MouseButton::Middle => PointerButton::Secondary,
            _ => return,
        };
        match state {
            ElementState::Pressed => {
                if self.captured_button.is_some() {
                    return;
                }
                let Some(cursor) = self.cursor else {
                    return;
                };
                let viewport = self.viewport_size();
                let outcome = self.viewer.pointer_down(cursor, viewport, pointer_button);
                log::debug!("pointer down at {cursor} -> {outcome:?}");
                if matches!(
                    outcome,
                    PointerOutcome::GizmoDrag(_) | PointerOutcome::Orbit | PointerOutcome::Pan
                ) {
                    self.captured_button = Some(button);
                }
            }
            ElementState::Released => {
                if self.captured_button == Some(button) {
                    self.release_pointer();
                }
            }
        }
    }

    fn release_pointer(&mut self) {
        if self.captured_button.take().is_some() {
            self.viewer.pointer_up();
        }
    }

    fn render(&mut self) {
        let frame_start = Instant::now();
        if let Some(title) = self.timing.update(frame_start) {
            if let Some(window) = &self.window {
                window.set_title(&title);
            }
        }
        if self.viewer.bridge().orbit_enabled() {
            if let Some((yaw, pitch)) = self.input.orbit_delta(self.timing.frame_dt) {
                self.viewer.camera_mut().orbit(yaw, pitch);
            }
        }
        self.viewer.frame();

        let (Some(window), Some(egui)) = (self.window.as_ref(), self.egui.as_mut()) else {
            return;
        };
        let viewer = &self.viewer;
        let ui = &mut self.ui;
        let mut commands = Vec::new();
        let output = egui.run_ui(window, |ctx| {
            let rect = ctx.screen_rect();
            let painter = ctx.layer_painter(egui::LayerId::background());
            let gizmo = viewer.gizmo_shapes(Vec2::new(rect.width(), rect.height()));
            viewport::paint(
                &painter,
                rect,
                viewer.graph(),
                viewer.camera(),
                viewer.theme(),
                &gizmo,
            );
            commands = ui.draw(ctx, viewer, frame_start);
        });

        let clear = self.viewer.theme().background();
        if let Some(render) = &mut self.render {
            if let Err(err) = render.render(&output, clear) {
                log::error!("{err}");
            }
        }
        for command in commands {
            self.dispatch(command);
        }
        self.timing
            .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
    }
}

fn frame_duration_for(fps: f32) -> Duration {
    if fps > 1.0 {
        Duration::from_secs_f32(1.0 / fps)
    } else {
        Duration::from_millis(16)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_window(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (egui_consumed, _) = match (self.window.as_ref(), self.egui.as_mut()) {
            (Some(window), Some(egui)) => egui.on_window_event(window, &event),
            _ => (false, false),
        };
        let ui_wants_pointer = self
            .egui
            .as_ref()
            .is_some_and(|egui| egui.wants_pointer_input());
        let ui_wants_keyboard = self
            .egui
            .as_ref()
            .is_some_and(|egui| egui.wants_keyboard_input());

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
                event_loop.exit();
            }
            WindowEvent::Focused(false) => {
                self.input.release_all();
                self.release_pointer();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !ui_wants_keyboard && !egui_consumed {
                    self.handle_key(event_loop, &event);
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(render) = &mut self.render {
                    render.resize(new_size);
                }
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let (Some(window), Some(render)) = (&self.window, &mut self.render) {
                    render.resize(window.inner_size());
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let scale = self
                    .window
                    .as_ref()
                    .map(|window| window.scale_factor())
                    .unwrap_or(1.0);
                let logical = position.to_logical::<f32>(scale);
                let cursor = Vec2::new(logical.x, logical.y);
                self.cursor = Some(cursor);
                if self.captured_button.is_some() {
                    let viewport = self.viewport_size();
                    self.viewer.pointer_move(cursor, viewport);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if self.captured_button.is_none() {
                    self.cursor = None;
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let releasing = state == ElementState::Released;
                if releasing || !ui_wants_pointer {
                    self.handle_pointer_button(button, state);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if !ui_wants_pointer {
                    let lines = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_SCROLL_LINE,
                    };
                    self.viewer.scroll(lines);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.close_requested {
            return;
        }
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.viewer.teardown();
    }
}

pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = ViewerConfig::load()?;
    let registry = config.registry()?;
    let preferences = PreferenceStore::new(config.preferences_path.clone());
    let theme = preferences.load().theme;
    log::info!(
        "hangar: {} models, theme {}, assets from {}",
        registry.len(),
        theme.label(),
        config.asset_root.display()
    );
    log::info!("   Press ESC or close window to exit");

    let assets = AssetManager::new(config.asset_root.clone());
    let mut viewer = Viewer::new(registry, &config, theme, assets);
    viewer.start_loading();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);
    let mut app = App::new(config, viewer, preferences);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye!");
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
