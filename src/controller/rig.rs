//! Avatar rig: the Root → Yaw → Head → HandAnchor hierarchy, its per-frame
//! integration, and the first/third-person camera attachment.
//!
//! Camera pose is recomputed from rig state every frame rather than nudged
//! incrementally, so attaching twice is the same as attaching once.

use std::cell::RefCell;
use std::f32::consts::{PI, TAU};
use std::rc::Rc;

use glam::{Quat, Vec2, Vec3};

use crate::config::{Tuning, DEFAULT_THIRD_PERSON_DISTANCES};
use crate::controller::input::InputLayer;
use crate::controller::physics::{BodyExtent, CollisionWorld};
use crate::controller::pointer::PointerCaptureCoordinator;
use crate::error::AssetError;
use crate::model::{AssetLoader, AssetRequest, LoadedBody, NodeId, NodeShape, Scene};

/// Pitch limit, just short of straight up/down.
pub const MAX_PITCH: f32 = 89.0 * PI / 180.0;

const LANDING_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    FirstPerson,
    ThirdPerson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraModeState {
    pub mode: CameraMode,
    /// Index into the third-person distance list; kept while in first person.
    pub distance_index: usize,
}

/// Handles to the four rig nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigNodes {
    pub root: NodeId,
    pub yaw: NodeId,
    pub head: NodeId,
    pub hand: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodySource {
    Loaded(String),
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualBody {
    pub node: NodeId,
    pub source: BodySource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigSnapshot {
    pub mode: CameraMode,
    pub distance_index: usize,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub grounded: bool,
    pub vertical_velocity: f32,
    pub movement_enabled: bool,
    pub has_body: bool,
}

pub struct AvatarRig {
    tuning: Rc<Tuning>,
    scene: Option<Rc<RefCell<Scene>>>,
    input: Rc<RefCell<InputLayer>>,
    pointer: Rc<RefCell<PointerCaptureCoordinator>>,
    world: Rc<dyn CollisionWorld>,
    loader: Rc<dyn AssetLoader>,
    nodes: Option<RigNodes>,
    body: Option<VisualBody>,
    pending_body: Option<AssetRequest>,
    view: CameraModeState,
    yaw: f32,
    pitch: f32,
    vertical_velocity: f32,
    grounded: bool,
    movement_enabled: bool,
    last_tick: Option<f64>,
    started: bool,
}

impl AvatarRig {
    pub fn new(
        tuning: Rc<Tuning>,
        input: Rc<RefCell<InputLayer>>,
        pointer: Rc<RefCell<PointerCaptureCoordinator>>,
        world: Rc<dyn CollisionWorld>,
        loader: Rc<dyn AssetLoader>,
    ) -> Self {
        Self {
            tuning,
            scene: None,
            input,
            pointer,
            world,
            loader,
            nodes: None,
            body: None,
            pending_body: None,
            view: CameraModeState { mode: CameraMode::FirstPerson, distance_index: 0 },
            yaw: 0.0,
            pitch: 0.0,
            vertical_velocity: 0.0,
            grounded: false,
            movement_enabled: true,
            last_tick: None,
            started: false,
        }
    }

    pub fn set_scene(&mut self, scene: Rc<RefCell<Scene>>) {
        self.scene = Some(scene);
    }

    /// Begin the session. Later calls do nothing.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        tracing::info!("avatar rig starting");
        self.ensure_rig();
    }

    /// Build the hierarchy and request the visual body. No-op once built, and
    /// deferred (not an error) while no scene is attached.
    pub fn ensure_rig(&mut self) {
        if self.nodes.is_some() {
            return;
        }
        let Some(scene_rc) = self.scene.clone() else {
            tracing::trace!("no scene yet, rig construction deferred");
            return;
        };

        {
            let mut scene = scene_rc.borrow_mut();
            let spawn = self.spawn_position(&scene);
            let t = &self.tuning;

            let root = scene.nodes.add("avatar_root", None, spawn);
            let yaw = scene.nodes.add("avatar_yaw", Some(root), Vec3::ZERO);
            let head = scene.nodes.add("avatar_head", Some(yaw), Vec3::Y * t.eye_height);
            let hand = scene.nodes.add("avatar_hand", Some(head), t.hand_offset.to_local());
            self.nodes = Some(RigNodes { root, yaw, head, hand });

            if let Some(camera) = &scene.camera {
                let (yaw, pitch) = camera.yaw_pitch(&scene.nodes);
                self.yaw = yaw;
                self.pitch = pitch.clamp(-MAX_PITCH, MAX_PITCH);
            }
            tracing::info!(?spawn, yaw = self.yaw, pitch = self.pitch, "avatar rig built");
        }

        self.pending_body = Some(self.loader.load(&self.tuning.body_asset));
        self.poll_body();
        self.apply_rig_to_nodes();
    }

    fn spawn_position(&self, scene: &Scene) -> Vec3 {
        if let Some(spawn) = scene.spawn_point {
            return spawn;
        }
        match &scene.camera {
            // keep the eye where the camera already was
            Some(camera) => camera.world_position(&scene.nodes) - Vec3::Y * self.tuning.eye_height,
            None => self.tuning.default_spawn,
        }
    }

    fn poll_body(&mut self) {
        let Some(request) = &self.pending_body else {
            return;
        };
        let Some(result) = request.poll() else {
            return;
        };
        self.pending_body = None;
        self.install_body(result);
    }

    fn install_body(&mut self, result: Result<LoadedBody, AssetError>) {
        let (Some(nodes), Some(scene_rc)) = (self.nodes, self.scene.clone()) else {
            return;
        };
        let mut scene = scene_rc.borrow_mut();
        let tree = &mut scene.nodes;

        let body = match result {
            Ok(loaded) => {
                let node = tree.add("avatar_body", Some(nodes.root), Vec3::ZERO);
                for part in &loaded.parts {
                    let mesh = part.mesh.clone().unwrap_or_else(|| part.name.clone());
                    tree.add_shaped(&part.name, Some(node), part.offset, NodeShape::Mesh(mesh));
                }
                tracing::info!(body = %loaded.name, parts = loaded.parts.len(), "avatar body loaded");
                VisualBody { node, source: BodySource::Loaded(loaded.name) }
            }
            Err(e) => {
                tracing::warn!("avatar body unavailable ({e}), using capsule");
                let (height, radius) = (self.tuning.body_height, self.tuning.body_radius);
                let node = tree.add_shaped(
                    "avatar_capsule",
                    Some(nodes.root),
                    Vec3::Y * (height * 0.5),
                    NodeShape::Capsule { height, radius },
                );
                VisualBody { node, source: BodySource::Fallback }
            }
        };

        // never let the avatar's own aim rays hit its body
        for id in tree.descendants(body.node) {
            tree.get_mut(id).pickable = false;
        }
        tree.get_mut(body.node).visible = self.view.mode == CameraMode::ThirdPerson;
        self.body = Some(body);
    }

    /// Camera onto the head with an identity local pose; body hidden.
    pub fn attach_first_person(&mut self) {
        let (Some(nodes), Some(scene_rc)) = (self.nodes, self.scene.clone()) else {
            return;
        };
        let mut scene = scene_rc.borrow_mut();
        let fov = self.tuning.fov;
        let Some(camera) = scene.camera.as_mut() else {
            return;
        };
        camera.parent = Some(nodes.head);
        camera.position = Vec3::ZERO;
        camera.rotation = Quat::IDENTITY;
        camera.fov_y = fov;
        if let Some(body) = &self.body {
            scene.nodes.get_mut(body.node).visible = false;
        }
    }

    /// Camera detached, behind and above the head along the current heading,
    /// looking at the head; body shown.
    pub fn attach_third_person(&mut self) {
        let (Some(nodes), Some(scene_rc)) = (self.nodes, self.scene.clone()) else {
            return;
        };
        let mut scene = scene_rc.borrow_mut();
        let head = scene.nodes.world_position(nodes.head);
        let eye = head - heading_forward(self.yaw) * self.third_person_distance()
            + Vec3::Y * self.tuning.third_person_height;
        let fov = self.tuning.fov;
        let Some(camera) = scene.camera.as_mut() else {
            return;
        };
        camera.set_look_at(eye, head);
        camera.fov_y = fov;
        if let Some(body) = &self.body {
            scene.nodes.get_mut(body.node).visible = true;
        }
    }

    /// An unvalidated empty list falls back to the default near distance.
    fn third_person_distance(&self) -> f32 {
        let distances = &self.tuning.third_person_distances;
        distances
            .get(self.view.distance_index)
            .or_else(|| distances.first())
            .copied()
            .unwrap_or(DEFAULT_THIRD_PERSON_DISTANCES[0])
    }

    pub fn toggle_view(&mut self) {
        self.view.mode = match self.view.mode {
            CameraMode::FirstPerson => CameraMode::ThirdPerson,
            CameraMode::ThirdPerson => CameraMode::FirstPerson,
        };
        tracing::info!(mode = ?self.view.mode, distance = self.view.distance_index, "camera view");
        self.apply_attachment();
    }

    /// Next third-person distance; ignored in first person.
    pub fn cycle_distance(&mut self) {
        if self.view.mode != CameraMode::ThirdPerson {
            tracing::trace!("distance cycling ignored in first person");
            return;
        }
        let len = self.tuning.third_person_distances.len().max(1);
        self.view.distance_index = (self.view.distance_index + 1) % len;
        tracing::info!(distance = self.view.distance_index, "camera distance");
        self.attach_third_person();
    }

    /// The bound view key: shift-modified means "cycle distance" when already
    /// in third person.
    pub fn handle_view_request(&mut self, cycle: bool) {
        if cycle && self.view.mode == CameraMode::ThirdPerson {
            self.cycle_distance();
        } else {
            self.toggle_view();
        }
    }

    fn apply_attachment(&mut self) {
        match self.view.mode {
            CameraMode::FirstPerson => self.attach_first_person(),
            CameraMode::ThirdPerson => self.attach_third_person(),
        }
    }

    /// One host render tick at `now_ms`. Skipped while scene or camera is missing.
    pub fn tick(&mut self, now_ms: f64) {
        let ready = self
            .scene
            .as_ref()
            .is_some_and(|s| s.borrow().camera.is_some());
        if !ready {
            tracing::trace!("no scene or camera, tick skipped");
            return;
        }
        self.ensure_rig();

        let dt = match self.last_tick {
            Some(last) => ((now_ms - last) / 1000.0).clamp(0.0, self.tuning.max_dt as f64) as f32,
            None => 0.0,
        };
        self.last_tick = Some(now_ms);

        self.poll_body();
        self.move_rig(dt);
        self.apply_rig_to_nodes();
    }

    /// Horizontal move from intent, then gravity and the ground probe.
    pub fn move_rig(&mut self, dt: f32) {
        if !self.movement_enabled {
            return;
        }
        let (Some(nodes), Some(scene_rc)) = (self.nodes, self.scene.clone()) else {
            return;
        };
        let (flags, speeds) = {
            let input = self.input.borrow();
            (input.get_movement_flags(), input.get_speeds())
        };
        let body = BodyExtent {
            radius: self.tuning.body_radius,
            height: self.tuning.body_height,
            step_height: self.tuning.step_height,
        };

        let mut scene = scene_rc.borrow_mut();
        let mut pos = scene.nodes.get(nodes.root).position;

        let (ax, az) = flags.axes();
        let intent = Vec2::new(ax, az);
        if intent != Vec2::ZERO {
            let dir = intent.normalize();
            let speed = if flags.running { speeds.run } else { speeds.walk };
            let heading = Quat::from_rotation_y(self.yaw);
            let delta = (heading * Vec3::X * dir.x + heading_forward(self.yaw) * dir.y) * speed * dt;
            pos = self.world.move_with_collisions(pos, delta, body);
        }

        self.grounded = self.world.probe_down(pos, self.tuning.ground_probe_length);
        if self.grounded {
            self.vertical_velocity = 0.0;
            // settle onto the surface the probe found
            let settle = Vec3::NEG_Y * self.tuning.ground_probe_length;
            pos = self.world.move_with_collisions(pos, settle, body);
        } else {
            self.vertical_velocity += self.tuning.gravity * dt;
            let fall = Vec3::Y * (self.vertical_velocity * dt);
            let moved = self.world.move_with_collisions(pos, fall, body);
            // A fall stopped short rests on something the probe could not see,
            // e.g. a ledge under the body's edge but not under its origin.
            if fall.y < 0.0 && moved.y > pos.y + fall.y + LANDING_EPSILON {
                self.vertical_velocity = 0.0;
                self.grounded = true;
            }
            pos = moved;
        }

        scene.nodes.get_mut(nodes.root).position = pos;
    }

    /// Write yaw/pitch onto the nodes and re-derive the camera pose.
    pub fn apply_rig_to_nodes(&mut self) {
        let (Some(nodes), Some(scene_rc)) = (self.nodes, self.scene.clone()) else {
            return;
        };
        {
            let mut scene = scene_rc.borrow_mut();
            let heading = Quat::from_rotation_y(self.yaw);
            scene.nodes.get_mut(nodes.yaw).rotation = heading;
            scene.nodes.get_mut(nodes.head).rotation = Quat::from_rotation_x(self.pitch);
            if let Some(body) = &self.body {
                // bodies are authored facing +Z; the rig looks down -Z
                scene.nodes.get_mut(body.node).rotation = heading * Quat::from_rotation_y(PI);
            }
        }
        self.apply_attachment();
    }

    /// Relative pointer motion in pixels. Applied only while movement is enabled
    /// and the pointer is captured.
    pub fn on_pointer_move(&mut self, dx: f32, dy: f32) {
        if !self.movement_enabled || !self.pointer.borrow().is_locked() {
            return;
        }
        let sens = self.tuning.mouse_sensitivity;
        self.set_look(self.yaw - dx * sens, self.pitch - dy * sens);
    }

    /// Yaw is wrapped into [0, 2π), pitch clamped to ±89°.
    pub fn set_look(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw.rem_euclid(TAU);
        self.pitch = pitch.clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Freeze or release the avatar without tearing the rig down.
    pub fn enable_movement(&mut self, enabled: bool) {
        if self.movement_enabled != enabled {
            tracing::debug!(enabled, "avatar movement");
        }
        self.movement_enabled = enabled;
    }

    pub fn get_rig_root(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.root)
    }

    pub fn get_head_node(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.head)
    }

    pub fn get_hand_node(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.hand)
    }

    pub fn nodes(&self) -> Option<RigNodes> {
        self.nodes
    }

    pub fn view(&self) -> CameraModeState {
        self.view
    }

    pub fn body(&self) -> Option<&VisualBody> {
        self.body.as_ref()
    }

    pub fn head_world_position(&self) -> Option<Vec3> {
        let nodes = self.nodes?;
        let scene = self.scene.as_ref()?;
        let position = scene.borrow().nodes.world_position(nodes.head);
        Some(position)
    }

    pub fn get_state(&self) -> RigSnapshot {
        let position = match (self.nodes, &self.scene) {
            (Some(nodes), Some(scene)) => scene.borrow().nodes.get(nodes.root).position,
            _ => Vec3::ZERO,
        };
        RigSnapshot {
            mode: self.view.mode,
            distance_index: self.view.distance_index,
            position,
            yaw: self.yaw,
            pitch: self.pitch,
            grounded: self.grounded,
            vertical_velocity: self.vertical_velocity,
            movement_enabled: self.movement_enabled,
            has_body: self.body.is_some(),
        }
    }
}

/// Unit horizontal forward for `yaw` (0 faces -Z).
pub fn heading_forward(yaw: f32) -> Vec3 {
    Quat::from_rotation_y(yaw) * Vec3::NEG_Z
}
