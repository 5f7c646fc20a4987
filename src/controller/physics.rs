use glam::Vec3;

/// Upright box used for the avatar body; origin sits at the feet.
#[derive(Debug, Clone, Copy)]
pub struct BodyExtent {
    pub radius: f32,
    pub height: f32,
    /// Ledges up to this high are climbed during horizontal moves.
    pub step_height: f32,
}

/// Collision and ground queries the rig needs from the world.
pub trait CollisionWorld {
    /// Move a body from `from` by `delta`, stopping at geometry. Returns the new position.
    fn move_with_collisions(&self, from: Vec3, delta: Vec3, body: BodyExtent) -> Vec3;

    /// Whether collidable geometry lies within `length` below `origin`.
    fn probe_down(&self, origin: Vec3, length: f32) -> bool;
}

/// No geometry at all: moves pass through and nothing is ever below.
#[derive(Debug, Default)]
pub struct OpenSpace;

impl CollisionWorld for OpenSpace {
    fn move_with_collisions(&self, from: Vec3, delta: Vec3, _body: BodyExtent) -> Vec3 {
        from + delta
    }

    fn probe_down(&self, _origin: Vec3, _length: f32) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    fn around_body(feet: Vec3, body: BodyExtent) -> Self {
        let r = Vec3::new(body.radius, 0.0, body.radius);
        Self { min: feet - r, max: feet + r + Vec3::Y * body.height }
    }

    /// Strict overlap; touching faces do not collide.
    fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmplt(other.max).all() && self.max.cmpgt(other.min).all()
    }

    fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }
}

/// Static axis-aligned boxes. Moves resolve one axis at a time (X, Z, then Y).
/// A blocked horizontal axis first tries again lifted by the step height and is
/// dropped if that is blocked too; a blocked fall lands on the box top.
#[derive(Debug, Default)]
pub struct BoxWorld {
    boxes: Vec<Aabb>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box(mut self, aabb: Aabb) -> Self {
        self.boxes.push(aabb);
        self
    }

    /// A floor slab whose top surface is at `height`.
    pub fn with_floor(self, height: f32) -> Self {
        self.with_box(Aabb::new(
            Vec3::new(-1000.0, height - 1.0, -1000.0),
            Vec3::new(1000.0, height, 1000.0),
        ))
    }

    fn blocking(&self, feet: Vec3, body: BodyExtent) -> Option<&Aabb> {
        let probe = Aabb::around_body(feet, body);
        self.boxes.iter().find(|b| b.overlaps(&probe))
    }
}

impl CollisionWorld for BoxWorld {
    fn move_with_collisions(&self, from: Vec3, delta: Vec3, body: BodyExtent) -> Vec3 {
        let mut pos = from;

        for axis in [Vec3::X, Vec3::Z] {
            let step = axis * delta.dot(axis);
            if step == Vec3::ZERO {
                continue;
            }
            if self.blocking(pos + step, body).is_none() {
                pos += step;
            } else {
                let lifted = pos + step + Vec3::Y * body.step_height;
                if body.step_height > 0.0 && self.blocking(lifted, body).is_none() {
                    pos = lifted;
                }
            }
        }

        if delta.y != 0.0 {
            let next = pos + Vec3::Y * delta.y;
            match self.blocking(next, body) {
                None => pos = next,
                // landed: rest on the highest box we would sink into
                Some(_) if delta.y < 0.0 => {
                    let probe = Aabb::around_body(next, body);
                    let top = self
                        .boxes
                        .iter()
                        .filter(|b| b.overlaps(&probe))
                        .map(|b| b.max.y)
                        .fold(f32::MIN, f32::max);
                    pos.y = top.min(pos.y);
                }
                Some(_) => {}
            }
        }
        pos
    }

    fn probe_down(&self, origin: Vec3, length: f32) -> bool {
        self.boxes.iter().any(|b| {
            b.contains_xz(origin) && b.max.y <= origin.y && b.max.y >= origin.y - length
        })
    }
}
