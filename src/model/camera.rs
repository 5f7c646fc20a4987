use glam::{Mat4, Quat, Vec3};

use super::transform::{NodeId, TransformTree};

/// Column-major view-projection, ready to upload for a host renderer.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// Camera pose lives in the space of its parent node (or the world when
/// detached). Local -Z is the viewing direction.
#[derive(Debug, Clone)]
pub struct Camera {
    pub parent: Option<NodeId>,
    pub position: Vec3,
    pub rotation: Quat,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            parent: None,
            position: Vec3::new(0.0, 1.6, 0.0),
            rotation: Quat::IDENTITY,
            fov_y: 60f32.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) { self.aspect = width as f32 / height.max(1) as f32; }

    pub fn world_matrix(&self, tree: &TransformTree) -> Mat4 {
        let local = Mat4::from_rotation_translation(self.rotation, self.position);
        match self.parent {
            Some(parent) => tree.world_matrix(parent) * local,
            None => local,
        }
    }

    pub fn world_position(&self, tree: &TransformTree) -> Vec3 {
        self.world_matrix(tree).transform_point3(Vec3::ZERO)
    }

    pub fn forward(&self, tree: &TransformTree) -> Vec3 {
        self.world_matrix(tree).transform_vector3(Vec3::NEG_Z).normalize_or_zero()
    }

    /// Yaw about +Y (0 looks down -Z, wrapped to [0, 2π)) and pitch (positive
    /// looks up) of the current world orientation.
    pub fn yaw_pitch(&self, tree: &TransformTree) -> (f32, f32) {
        let f = self.forward(tree);
        if f == Vec3::ZERO {
            return (0.0, 0.0);
        }
        let yaw = (-f.x).atan2(-f.z).rem_euclid(std::f32::consts::TAU);
        let pitch = f.y.clamp(-1.0, 1.0).asin();
        (yaw, pitch)
    }

    /// Detached placement at `eye`, oriented to look at `target`.
    pub fn set_look_at(&mut self, eye: Vec3, target: Vec3) {
        self.parent = None;
        self.position = eye;
        let dir = target - eye;
        if dir.length_squared() > 1e-8 {
            let view = Mat4::look_at_rh(eye, target, Vec3::Y);
            let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
            self.rotation = rotation;
        }
    }

    pub fn view_proj(&self, tree: &TransformTree) -> Mat4 {
        let view = self.world_matrix(tree).inverse();
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * view
    }

    pub fn uniform(&self, tree: &TransformTree) -> CameraUniform {
        CameraUniform { view_proj: self.view_proj(tree).to_cols_array_2d() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_faces_target() {
        let tree = TransformTree::new();
        let mut cam = Camera::new(800, 600);
        cam.set_look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::new(0.0, 2.0, 0.0));
        let f = cam.forward(&tree);
        assert!((f - Vec3::NEG_Z).length() < 1e-5, "{f:?}");
    }

    #[test]
    fn yaw_pitch_reads_back_orientation() {
        let tree = TransformTree::new();
        let mut cam = Camera::new(800, 600);
        cam.rotation = Quat::from_rotation_y(1.0) * Quat::from_rotation_x(0.3);
        let (yaw, pitch) = cam.yaw_pitch(&tree);
        assert!((yaw - 1.0).abs() < 1e-4);
        assert!((pitch - 0.3).abs() < 1e-4);
    }

    #[test]
    fn uniform_is_plain_bytes() {
        let tree = TransformTree::new();
        let cam = Camera::new(800, 600);
        let uniform = cam.uniform(&tree);
        let bytes = bytemuck::bytes_of(&uniform);
        assert_eq!(bytes.len(), 64);
    }
}
