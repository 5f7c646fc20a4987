use glam::Vec3;

use super::camera::Camera;
use super::transform::TransformTree;

/// The slice of the host scene the avatar core touches: the node hierarchy,
/// the active camera, and an optional level-provided spawn point.
///
/// Shared between the rig and the host as `Rc<RefCell<Scene>>`.
#[derive(Debug, Default)]
pub struct Scene {
    pub nodes: TransformTree,
    pub camera: Option<Camera>,
    pub spawn_point: Option<Vec3>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(camera: Camera) -> Self {
        Self { camera: Some(camera), ..Self::default() }
    }
}
