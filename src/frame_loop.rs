use std::cell::RefCell;
use std::rc::Rc;

use crate::config::Tuning;
use crate::controller::events::{EventBus, Signal, SignalKind};
use crate::controller::footsteps::{FootstepCadence, TrackedPosition};
use crate::controller::gamepad::GamepadSource;
use crate::controller::input::InputLayer;
use crate::controller::physics::CollisionWorld;
use crate::controller::pointer::{PointerCapture, PointerCaptureCoordinator};
use crate::controller::rig::AvatarRig;
use crate::model::{AssetLoader, CameraUniform, Scene};

/// The wired avatar core: one bus, one input layer, one pointer coordinator,
/// one rig, all sharing the host scene.
pub struct AvatarCore {
    pub tuning: Rc<Tuning>,
    pub bus: Rc<EventBus>,
    pub scene: Rc<RefCell<Scene>>,
    pub input: Rc<RefCell<InputLayer>>,
    pub pointer: Rc<RefCell<PointerCaptureCoordinator>>,
    pub rig: Rc<RefCell<AvatarRig>>,
}

impl AvatarCore {
    pub fn new(
        tuning: Tuning,
        scene: Rc<RefCell<Scene>>,
        platform: Box<dyn PointerCapture>,
        world: Rc<dyn CollisionWorld>,
        loader: Rc<dyn AssetLoader>,
    ) -> Self {
        let tuning = Rc::new(tuning);
        let bus = Rc::new(EventBus::new());
        let input = Rc::new(RefCell::new(InputLayer::new(tuning.clone(), bus.clone())));
        let pointer = Rc::new(RefCell::new(PointerCaptureCoordinator::new(platform)));
        let mut rig = AvatarRig::new(tuning.clone(), input.clone(), pointer.clone(), world, loader);
        rig.set_scene(scene.clone());
        let rig = Rc::new(RefCell::new(rig));

        for kind in [SignalKind::ModalOpened, SignalKind::ModalClosed] {
            let pointer = pointer.clone();
            bus.subscribe_to(kind, move |signal| pointer.borrow_mut().handle_signal(signal));
        }
        {
            let rig = rig.clone();
            bus.subscribe_to(SignalKind::ViewToggle, move |signal| {
                if let Signal::ViewToggle { cycle } = signal {
                    rig.borrow_mut().handle_view_request(*cycle);
                }
            });
        }

        Self { tuning, bus, scene, input, pointer, rig }
    }

    /// Session start: build the rig and reconcile pointer capture.
    pub fn start(&self) {
        self.rig.borrow_mut().start();
        self.pointer.borrow_mut().reconcile();
    }

    pub fn frame_loop(&self) -> FrameLoopContext {
        FrameLoopContext {
            scene: self.scene.clone(),
            input: self.input.clone(),
            rig: self.rig.clone(),
            footsteps: FootstepCadence::new(
                self.bus.clone(),
                self.tuning.stride_walk,
                self.tuning.stride_run,
            ),
        }
    }

    /// One gamepad sample; driven by its own repaint-scheduled loop.
    pub fn poll_gamepad(&self, source: &dyn GamepadSource) {
        self.input.borrow_mut().poll_gamepad(source);
    }
}

/// Per-render-tick work, in order: integrate the rig (which reads the intent
/// already written by key and gamepad handlers), then sample footstep cadence.
pub struct FrameLoopContext {
    pub scene: Rc<RefCell<Scene>>,
    pub input: Rc<RefCell<InputLayer>>,
    pub rig: Rc<RefCell<AvatarRig>>,
    pub footsteps: FootstepCadence,
}

impl FrameLoopContext {
    pub fn update(&mut self, now_ms: f64) {
        self.rig.borrow_mut().tick(now_ms);

        let tracked = self.tracked_position();
        let flags = self.input.borrow().get_movement_flags();
        self.footsteps.sample(tracked, flags);
    }

    /// Rig head when the rig exists, else the bare camera.
    fn tracked_position(&self) -> Option<TrackedPosition> {
        if let Some(position) = self.rig.borrow().head_world_position() {
            return Some(TrackedPosition { position, attached: true });
        }
        let scene = self.scene.borrow();
        let camera = scene.camera.as_ref()?;
        Some(TrackedPosition {
            position: camera.world_position(&scene.nodes),
            attached: camera.parent.is_some(),
        })
    }

    pub fn camera_uniform(&self) -> Option<CameraUniform> {
        let scene = self.scene.borrow();
        scene.camera.as_ref().map(|c| c.uniform(&scene.nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::controller::physics::BoxWorld;
    use crate::controller::rig::CameraMode;
    use crate::model::{Camera, MemoryAssetLoader};

    struct Grant(Rc<Cell<bool>>);

    impl PointerCapture for Grant {
        fn is_captured(&self) -> bool {
            self.0.get()
        }
        fn request_capture(&self) {
            self.0.set(true);
        }
        fn release_capture(&self) {
            self.0.set(false);
        }
    }

    fn core() -> AvatarCore {
        let mut scene = Scene::with_camera(Camera::new(800, 600));
        scene.spawn_point = Some(glam::Vec3::ZERO);
        AvatarCore::new(
            Tuning::default(),
            Rc::new(RefCell::new(scene)),
            Box::new(Grant(Rc::new(Cell::new(false)))),
            Rc::new(BoxWorld::new().with_floor(0.0)),
            Rc::new(MemoryAssetLoader::new()),
        )
    }

    #[test]
    fn walking_frames_produce_footsteps() {
        let core = core();
        core.start();
        let steps = Rc::new(Cell::new(0));
        let s = steps.clone();
        core.bus.subscribe_to(SignalKind::Footstep, move |_| s.set(s.get() + 1));

        let mut frames = core.frame_loop();
        core.input.borrow_mut().on_key_down("KeyW");
        for i in 0..40 {
            frames.update(i as f64 * 50.0);
        }
        // 39 moves of 0.09 units; a 0.7 stride takes 8 of them
        assert_eq!(steps.get(), 4);
    }

    #[test]
    fn view_key_switches_camera_mode() {
        let core = core();
        core.start();
        core.input.borrow_mut().on_key_down("KeyV");
        assert_eq!(core.rig.borrow().view().mode, CameraMode::ThirdPerson);
    }

    #[test]
    fn modal_signals_reach_the_pointer_coordinator() {
        let core = core();
        core.start();
        core.pointer.borrow_mut().on_surface_click();
        assert!(core.pointer.borrow().is_locked());
        core.bus.publish(Signal::ModalOpened { reason: "settings".into() });
        assert!(!core.pointer.borrow().is_locked());
        core.bus.publish(Signal::ModalClosed { reason: "settings".into() });
        assert!(core.pointer.borrow().is_locked());
    }

    #[test]
    fn uniform_available_with_camera() {
        let core = core();
        core.start();
        let mut frames = core.frame_loop();
        frames.update(0.0);
        assert!(frames.camera_uniform().is_some());
    }
}
