use std::rc::Rc;

use glam::Vec3;

use crate::controller::events::{EventBus, Signal};
use crate::model::MovementFlags;

/// Position sampled for cadence; `attached` is false for a free-floating camera.
#[derive(Debug, Clone, Copy)]
pub struct TrackedPosition {
    pub position: Vec3,
    pub attached: bool,
}

/// Emits one [`Signal::Footstep`] per stride of distance covered while moving.
pub struct FootstepCadence {
    bus: Rc<EventBus>,
    stride_walk: f32,
    stride_run: f32,
    last: Option<Vec3>,
    accumulated: f32,
}

impl FootstepCadence {
    pub fn new(bus: Rc<EventBus>, stride_walk: f32, stride_run: f32) -> Self {
        Self { bus, stride_walk, stride_run, last: None, accumulated: 0.0 }
    }

    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    /// Called once per frame. Without a tracked position it simply waits for
    /// the next frame. Returns whether a step fired.
    pub fn sample(&mut self, tracked: Option<TrackedPosition>, flags: MovementFlags) -> bool {
        let Some(tracked) = tracked else {
            return false;
        };
        let previous = self.last.replace(tracked.position);
        let Some(previous) = previous else {
            return false;
        };
        if !flags.is_moving() || !tracked.attached {
            return false;
        }

        self.accumulated += tracked.position.distance(previous);
        let stride = if flags.running { self.stride_run } else { self.stride_walk };
        if self.accumulated < stride {
            return false;
        }
        self.accumulated = 0.0;
        self.bus.publish(Signal::Footstep { running: flags.running });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn at(z: f32) -> Option<TrackedPosition> {
        Some(TrackedPosition { position: Vec3::new(0.0, 0.0, z), attached: true })
    }

    fn walking() -> MovementFlags {
        MovementFlags { forward: true, ..Default::default() }
    }

    #[test]
    fn steps_once_per_stride_and_resets() {
        let bus = Rc::new(EventBus::new());
        let steps = Rc::new(Cell::new(0));
        let s = steps.clone();
        bus.subscribe(move |_| s.set(s.get() + 1));
        let mut cadence = FootstepCadence::new(bus, 0.7, 0.95);

        assert!(!cadence.sample(at(0.0), walking()));
        assert!(!cadence.sample(at(0.5), walking()));
        assert!(cadence.sample(at(1.0), walking()));
        // reset to zero, not carried over
        assert_eq!(cadence.accumulated(), 0.0);
        assert!(!cadence.sample(at(1.5), walking()));
        assert_eq!(steps.get(), 1);
    }

    #[test]
    fn running_uses_longer_stride() {
        let mut cadence = FootstepCadence::new(Rc::new(EventBus::new()), 0.7, 0.95);
        let running = MovementFlags { forward: true, running: true, ..Default::default() };
        cadence.sample(at(0.0), running);
        assert!(!cadence.sample(at(0.8), running));
        assert!(cadence.sample(at(1.0), running));
    }

    #[test]
    fn idle_detached_or_missing_positions_do_not_accumulate() {
        let mut cadence = FootstepCadence::new(Rc::new(EventBus::new()), 0.7, 0.95);
        assert!(!cadence.sample(None, walking()));
        cadence.sample(at(0.0), MovementFlags::default());
        cadence.sample(at(5.0), MovementFlags::default());
        assert_eq!(cadence.accumulated(), 0.0);
        let free = Some(TrackedPosition { position: Vec3::new(0.0, 0.0, 9.0), attached: false });
        cadence.sample(free, walking());
        assert_eq!(cadence.accumulated(), 0.0);
    }
}
