use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window},
};
use glam::Vec3;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

// Import from the library crate
use avatar_rig::{logging, model, controller, AvatarCore, Tuning};

use model::{BodyPart, Camera, LoadedBody, MemoryAssetLoader, Scene};
use controller::{Aabb, BoxWorld, NoGamepads, PointerCapture};

/// Cursor grab stands in for pointer lock. winit cannot report the grab
/// state, so the last successful request is remembered.
struct WinitPointerCapture {
    window: Rc<Window>,
    captured: Rc<Cell<bool>>,
}

impl PointerCapture for WinitPointerCapture {
    fn is_captured(&self) -> bool {
        self.captured.get()
    }

    fn request_capture(&self) {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                self.window.set_cursor_visible(false);
                self.captured.set(true);
            }
            Err(e) => tracing::debug!("cursor grab rejected: {e}"),
        }
    }

    fn release_capture(&self) {
        let _ = self.window.set_cursor_grab(CursorGrabMode::None);
        self.window.set_cursor_visible(true);
        self.captured.set(false);
    }
}

fn load_tuning() -> Tuning {
    let Ok(path) = std::env::var("AVATAR_TUNING") else {
        return Tuning::default();
    };
    match std::fs::read_to_string(&path).map(|json| Tuning::from_json(&json)) {
        Ok(Ok(tuning)) => {
            tracing::info!(%path, "loaded tuning");
            tuning
        }
        Ok(Err(e)) => {
            tracing::warn!(%path, "invalid tuning, using defaults: {e}");
            Tuning::default()
        }
        Err(e) => {
            tracing::warn!(%path, "cannot read tuning, using defaults: {e}");
            Tuning::default()
        }
    }
}

fn demo_body(name: &str) -> LoadedBody {
    let part = |name: &str, offset: Vec3| BodyPart {
        name: name.to_string(),
        mesh: Some(format!("mannequin_{name}")),
        offset,
    };
    LoadedBody {
        name: name.to_string(),
        parts: vec![
            part("torso", Vec3::new(0.0, 1.1, 0.0)),
            part("head", Vec3::new(0.0, 1.65, 0.0)),
            part("legs", Vec3::new(0.0, 0.45, 0.0)),
        ],
    }
}

fn main() {
    logging::init();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            tracing::error!("cannot create event loop: {e}");
            return;
        }
    };
    let window_attributes = Window::default_attributes()
        .with_title("Avatar Rig - Native")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    #[allow(deprecated)]
    let window = match event_loop.create_window(window_attributes) {
        Ok(window) => Rc::new(window),
        Err(e) => {
            tracing::error!("cannot create window: {e}");
            return;
        }
    };

    let tuning = load_tuning();
    let size = window.inner_size();
    let scene = Rc::new(RefCell::new(Scene::with_camera(Camera::new(size.width, size.height))));
    scene.borrow_mut().spawn_point = Some(Vec3::ZERO);

    let world = BoxWorld::new()
        .with_floor(0.0)
        .with_box(Aabb::new(Vec3::new(3.0, 0.0, -3.0), Vec3::new(4.0, 2.5, 3.0)))
        .with_box(Aabb::new(Vec3::new(-2.0, 0.0, -6.0), Vec3::new(0.0, 0.25, -4.0)));
    let loader = MemoryAssetLoader::new().with_body(demo_body(&tuning.body_asset));

    let core = AvatarCore::new(
        tuning,
        scene.clone(),
        Box::new(WinitPointerCapture { window: window.clone(), captured: Rc::new(Cell::new(false)) }),
        Rc::new(world),
        Rc::new(loader),
    );
    core.start();

    let mut frames = core.frame_loop();
    let gamepads = NoGamepads;
    let started = Instant::now();
    let mut last_report = Instant::now();

    #[allow(deprecated)]
    let result = event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { ref event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(physical_size) => {
                    if let Some(camera) = scene.borrow_mut().camera.as_mut() {
                        camera.set_aspect(physical_size.width, physical_size.height);
                    }
                }
                WindowEvent::Focused(focused) => {
                    if *focused {
                        core.pointer.borrow_mut().on_visible();
                    } else {
                        core.input.borrow_mut().clear_held();
                    }
                }
                WindowEvent::KeyboardInput { event: KeyEvent { state, physical_key, .. }, .. } => {
                    if let PhysicalKey::Code(code) = physical_key {
                        // KeyCode debug names match DOM `code` strings
                        let code = format!("{code:?}");
                        match state {
                            ElementState::Pressed => {
                                if core.input.borrow().is_release_pointer(&code) {
                                    core.pointer.borrow_mut().request_unlock();
                                }
                                core.input.borrow_mut().on_key_down(&code);
                            }
                            ElementState::Released => core.input.borrow_mut().on_key_up(&code),
                        }
                    }
                }
                WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                    core.pointer.borrow_mut().on_surface_click();
                }
                WindowEvent::RedrawRequested => {
                    core.poll_gamepad(&gamepads);
                    frames.update(started.elapsed().as_secs_f64() * 1000.0);

                    if last_report.elapsed() >= Duration::from_secs(1) {
                        last_report = Instant::now();
                        let state = core.rig.borrow().get_state();
                        tracing::info!(
                            mode = ?state.mode,
                            position = ?state.position,
                            yaw = state.yaw,
                            pitch = state.pitch,
                            grounded = state.grounded,
                            "rig"
                        );
                    }
                }
                _ => {}
            },
            Event::DeviceEvent { event: DeviceEvent::MouseMotion { delta }, .. } => {
                core.rig.borrow_mut().on_pointer_move(delta.0 as f32, delta.1 as f32);
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    });
    if let Err(e) = result {
        tracing::error!("event loop failed: {e}");
    }
}
