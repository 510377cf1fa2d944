//! Boucle d'événements Winit.
//!
//! ## Pattern "Two-Phase App"
//!
//! Winit 0.30 impose que les fenêtres soient créées depuis un callback
//! (`resumed()` d'abord), et non dans `main()`. On garde donc un enum à deux
//! états :
//!
//! ```text
//! App::Initial { waker, settings }  →  [resumed()]  →  App::Running(Running)
//! ```
//!
//! ## Flux
//!
//! ```text
//! Threads Servo ── wake() ──▶ EventLoopProxy ──▶ user_event()
//!                                                   └─ servo.spin_event_loop()
//!                                                        └─ delegates → EventQueue
//! window_event() / user_event()
//!   └─ drain() : EventQueue ──▶ KioskShell::handle(ServoHost, event)
//!                                   └─ réponse renvoyée au pont si besoin
//! ```

use std::collections::HashSet;

use servo::{InputEvent, WheelDelta, WheelEvent, WheelMode};
use servo::{MouseButton as ServoMouseButton, MouseButtonAction, MouseButtonEvent};
use servo::{MouseLeftViewportEvent, MouseMoveEvent, RenderingContext, ServoBuilder};
use tracing::{debug, error, info, warn};
use webrender_api::units::DevicePoint;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::ModifiersState;
use winit::window::WindowId;

use crate::config::Settings;
use crate::host::{EventResponse, HostEvent, SurfaceHost};
use crate::keyutils;
use crate::servo_glue::{self, Queued, Waker, WakerEvent};
use crate::servo_host::{ServoHost, SurfaceWindow, WindowSet};
use crate::shell::KioskShell;
use crate::surface::SurfaceId;

/// Pixels par ligne pour les molettes à crans.
const LINE_HEIGHT: f32 = 76.0;

/// Application à deux phases de vie.
pub enum App {
    /// On attend que Winit appelle `resumed()`.
    Initial { waker: Waker, settings: Settings },
    Running(Running),
}

pub struct Running {
    windows: WindowSet,
    shell: KioskShell,
    modifiers: ModifiersState,
    /// Surfaces dont le prochain `CloseRequested` vient d'un Alt+F4 avalé.
    close_guard: HashSet<SurfaceId>,
}

impl App {
    pub fn new(event_loop: &EventLoop<WakerEvent>, settings: Settings) -> Self {
        Self::Initial {
            waker: Waker::new(event_loop),
            settings,
        }
    }
}

/// Préférences Servo adaptées à la machine.
#[allow(clippy::field_reassign_with_default)]
fn build_servo_preferences() -> servo::Preferences {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(4);

    let mut prefs = servo::Preferences::default();
    prefs.layout_threads = cpus.min(8);
    prefs.threadpools_async_runtime_workers_max = (cpus * 2).min(16);
    prefs.threadpools_image_cache_workers_max = cpus.min(8);
    prefs.threadpools_webrender_workers_max = (cpus / 2).clamp(2, 8);
    prefs.threadpools_resource_workers_max = cpus.min(8);
    prefs.gfx_precache_shaders = true;

    info!(
        cpus,
        layout_threads = prefs.layout_threads,
        "Servo preferences configured"
    );
    prefs
}

impl Running {
    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: HostEvent) -> EventResponse {
        let mut host = ServoHost::new(event_loop, &mut self.windows);
        self.shell.handle(&mut host, event)
    }

    /// Livre au shell tout ce que les delegates ont empilé, y compris ce que
    /// le shell lui-même provoque en chemin.
    fn drain(&mut self, event_loop: &ActiveEventLoop) {
        while let Some(Queued { event, reply_to }) = self.windows.queue().pop() {
            let response = self.dispatch(event_loop, event);
            if let Some(load) = reply_to {
                servo_glue::answer(load, response);
            }
        }
    }

    fn close_requested(&mut self, event_loop: &ActiveEventLoop, surface: SurfaceId) {
        if self.close_guard.remove(&surface) {
            debug!(%surface, "Close request from a suppressed Alt+F4 ignored");
            return;
        }
        let mut host = ServoHost::new(event_loop, &mut self.windows);
        if let Err(e) = host.close(surface) {
            warn!(%surface, error = %e, "Cannot close window");
        }
    }

    fn keyboard_input(
        &mut self,
        event_loop: &ActiveEventLoop,
        surface: SurfaceId,
        event: &winit::event::KeyEvent,
    ) {
        let input = keyutils::key_input_from_winit(event, self.modifiers);
        let alt_f4 = input.pressed && input.alt && input.is("F4");
        match self.dispatch(event_loop, HostEvent::BeforeInput { surface, input }) {
            EventResponse::Suppress => {
                if alt_f4 {
                    self.close_guard.insert(surface);
                }
            }
            EventResponse::Continue | EventResponse::Reply(_) => {
                if let Some(target) = self.windows.get(surface) {
                    let keyboard_event = keyutils::keyboard_event_from_winit(event, self.modifiers);
                    target
                        .webview
                        .notify_input_event(InputEvent::Keyboard(keyboard_event));
                }
            }
        }
    }
}

fn redraw(target: &SurfaceWindow) {
    if let Err(e) = target.rendering_context.make_current() {
        warn!(error = ?e, "Cannot make the GL context current");
        return;
    }
    target.rendering_context.prepare_for_rendering();
    target.webview.paint();
    target.rendering_context.present();
}

fn forward_pointer(target: &SurfaceWindow, event: &WindowEvent) {
    match event {
        WindowEvent::CursorMoved { position, .. } => {
            let point = DevicePoint::new(position.x as f32, position.y as f32);
            target.cursor.set(point);
            target
                .webview
                .notify_input_event(InputEvent::MouseMove(MouseMoveEvent::new(point.into())));
        }
        WindowEvent::CursorLeft { .. } => {
            target.webview.notify_input_event(InputEvent::MouseLeftViewport(
                MouseLeftViewportEvent::default(),
            ));
        }
        WindowEvent::MouseInput { state, button, .. } => {
            let servo_button = match button {
                WinitMouseButton::Left => ServoMouseButton::Left,
                WinitMouseButton::Right => ServoMouseButton::Right,
                WinitMouseButton::Middle => ServoMouseButton::Middle,
                WinitMouseButton::Back => ServoMouseButton::Back,
                WinitMouseButton::Forward => ServoMouseButton::Forward,
                WinitMouseButton::Other(id) => ServoMouseButton::Other(*id),
            };
            let action = match state {
                ElementState::Pressed => MouseButtonAction::Down,
                ElementState::Released => MouseButtonAction::Up,
            };
            target
                .webview
                .notify_input_event(InputEvent::MouseButton(MouseButtonEvent::new(
                    action,
                    servo_button,
                    target.cursor.get().into(),
                )));
        }
        WindowEvent::MouseWheel { delta, .. } => {
            let (x, y, mode) = match delta {
                MouseScrollDelta::LineDelta(dx, dy) => (
                    f64::from(dx * LINE_HEIGHT),
                    f64::from(dy * LINE_HEIGHT),
                    WheelMode::DeltaLine,
                ),
                MouseScrollDelta::PixelDelta(delta) => (delta.x, delta.y, WheelMode::DeltaPixel),
            };
            target.webview.notify_input_event(InputEvent::Wheel(WheelEvent::new(
                WheelDelta { x, y, z: 0.0, mode },
                target.cursor.get().into(),
            )));
        }
        _ => {}
    }
}

impl ApplicationHandler<WakerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let (waker, settings) = match self {
            Self::Initial { waker, settings } => (waker.clone(), settings.clone()),
            // Réactivation (macOS, mobile) : Main recréée si elle manque.
            Self::Running(running) => {
                running.dispatch(event_loop, HostEvent::Activate);
                running.drain(event_loop);
                return;
            }
        };

        let servo = ServoBuilder::default()
            .preferences(build_servo_preferences())
            .event_loop_waker(Box::new(waker))
            .build();

        let mut running = Running {
            windows: WindowSet::new(servo),
            shell: KioskShell::new(settings),
            modifiers: ModifiersState::default(),
            close_guard: HashSet::new(),
        };
        running.dispatch(event_loop, HostEvent::AppReady);
        running.drain(event_loop);

        if running.windows.is_empty() {
            error!("No window could be created, exiting");
            event_loop.exit();
        }
        *self = Self::Running(running);
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, _event: WakerEvent) {
        if let Self::Running(running) = self {
            running.windows.servo().spin_event_loop();
            running.drain(event_loop);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Self::Running(running) = self else {
            return;
        };
        running.windows.servo().spin_event_loop();
        running.drain(event_loop);

        let Some(surface) = running.windows.surface_for(window_id) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => running.close_requested(event_loop, surface),
            WindowEvent::Focused(false) => {
                running.dispatch(event_loop, HostEvent::FocusLost(surface));
            }
            WindowEvent::RedrawRequested => {
                if let Some(target) = running.windows.get(surface) {
                    redraw(target);
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(target) = running.windows.get(surface) {
                    target.rendering_context.resize(new_size);
                    target.webview.resize(new_size);
                }
            }
            WindowEvent::ModifiersChanged(new_modifiers) => {
                running.modifiers = new_modifiers.state();
            }
            WindowEvent::KeyboardInput { ref event, .. } => {
                running.keyboard_input(event_loop, surface, event);
            }
            WindowEvent::CursorMoved { .. }
            | WindowEvent::CursorLeft { .. }
            | WindowEvent::MouseInput { .. }
            | WindowEvent::MouseWheel { .. } => {
                if let Some(target) = running.windows.get(surface) {
                    forward_pointer(target, &event);
                }
            }
            _ => (),
        }

        running.drain(event_loop);
    }
}
