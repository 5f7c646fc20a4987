//! Pointer capture arbitration.
//!
//! Look control wants the pointer captured; modal UI wants it free. UI surfaces
//! take holds (by signal), look control sets the desired state, and
//! [`PointerCaptureCoordinator::reconcile`] is the only place that calls the
//! platform capture primitives.

use crate::controller::events::Signal;

/// Platform pointer-capture primitive. Requests may be silently rejected.
pub trait PointerCapture {
    fn is_captured(&self) -> bool;
    fn request_capture(&self);
    fn release_capture(&self);
}

pub struct PointerCaptureCoordinator {
    platform: Box<dyn PointerCapture>,
    desired_lock: bool,
    hold_count: u32,
    actual_lock: bool,
}

impl PointerCaptureCoordinator {
    pub fn new(platform: Box<dyn PointerCapture>) -> Self {
        let actual_lock = platform.is_captured();
        Self { platform, desired_lock: false, hold_count: 0, actual_lock }
    }

    pub fn desired_lock(&self) -> bool {
        self.desired_lock
    }

    pub fn hold_count(&self) -> u32 {
        self.hold_count
    }

    pub fn request_lock(&mut self) {
        self.desired_lock = true;
        self.reconcile();
    }

    pub fn request_unlock(&mut self) {
        self.desired_lock = false;
        self.reconcile();
    }

    pub fn hold(&mut self, reason: &str) {
        self.hold_count = self.hold_count.saturating_add(1);
        tracing::debug!(reason, holds = self.hold_count, "pointer hold");
        self.reconcile();
    }

    /// Safe to call more often than [`hold`](Self::hold); the count stops at zero.
    pub fn release(&mut self, reason: &str) {
        self.hold_count = self.hold_count.saturating_sub(1);
        tracing::debug!(reason, holds = self.hold_count, "pointer release");
        self.reconcile();
    }

    /// Bring the platform in line with (desired, holds). Without a state change
    /// this only reads the platform.
    pub fn reconcile(&mut self) {
        self.actual_lock = self.platform.is_captured();
        let allowed = self.desired_lock && self.hold_count == 0;
        if allowed && !self.actual_lock {
            tracing::debug!("requesting pointer capture");
            self.platform.request_capture();
        } else if !allowed && self.actual_lock {
            tracing::debug!("releasing pointer capture");
            self.platform.release_capture();
        } else {
            return;
        }
        self.actual_lock = self.platform.is_captured();
    }

    /// Fresh platform read.
    pub fn is_locked(&self) -> bool {
        self.platform.is_captured()
    }

    /// Last value observed by [`reconcile`](Self::reconcile).
    pub fn actual_lock(&self) -> bool {
        self.actual_lock
    }

    /// Modal open/close signals from UI collaborators.
    pub fn handle_signal(&mut self, signal: &Signal) {
        match signal {
            Signal::ModalOpened { reason } => self.hold(reason),
            Signal::ModalClosed { reason } => self.release(reason),
            _ => {}
        }
    }

    // Reconcile triggers from the host.

    /// A capture the platform dropped on its own (the browser's Escape) also
    /// clears the desired lock; re-requesting without a user gesture would be
    /// rejected anyway. The next surface click asks again.
    pub fn on_platform_lock_change(&mut self) {
        let allowed = self.desired_lock && self.hold_count == 0;
        if allowed && self.actual_lock && !self.platform.is_captured() {
            tracing::debug!("pointer capture dropped by the platform");
            self.desired_lock = false;
        }
        self.reconcile();
    }

    pub fn on_surface_click(&mut self) {
        self.request_lock();
    }

    pub fn on_visible(&mut self) {
        self.reconcile();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Grants or rejects capture synchronously; counts platform calls.
    #[derive(Clone, Default)]
    struct FakePlatform {
        captured: Rc<Cell<bool>>,
        reject: Rc<Cell<bool>>,
        calls: Rc<Cell<u32>>,
    }

    impl PointerCapture for FakePlatform {
        fn is_captured(&self) -> bool {
            self.captured.get()
        }
        fn request_capture(&self) {
            self.calls.set(self.calls.get() + 1);
            if !self.reject.get() {
                self.captured.set(true);
            }
        }
        fn release_capture(&self) {
            self.calls.set(self.calls.get() + 1);
            self.captured.set(false);
        }
    }

    fn coordinator() -> (PointerCaptureCoordinator, FakePlatform) {
        let platform = FakePlatform::default();
        (PointerCaptureCoordinator::new(Box::new(platform.clone())), platform)
    }

    #[test]
    fn holds_gate_capture_until_all_released() {
        let (mut pc, _) = coordinator();
        pc.request_lock();
        assert!(pc.is_locked());

        pc.hold("a");
        pc.hold("b");
        pc.release("a");
        assert!(!pc.is_locked());
        assert_eq!(pc.hold_count(), 1);

        pc.release("b");
        assert!(pc.is_locked());
        assert!(pc.actual_lock());
    }

    #[test]
    fn excess_releases_clamp_at_zero() {
        let (mut pc, _) = coordinator();
        pc.release("x");
        pc.release("x");
        assert_eq!(pc.hold_count(), 0);
        pc.hold("y");
        assert_eq!(pc.hold_count(), 1);
        pc.request_lock();
        assert!(!pc.is_locked());
    }

    #[test]
    fn invariant_holds_across_call_sequences() {
        let (mut pc, _) = coordinator();
        let ops: [fn(&mut PointerCaptureCoordinator); 4] = [
            |p| p.hold("m"),
            |p| p.release("m"),
            |p| p.request_lock(),
            |p| p.request_unlock(),
        ];
        // deterministic pseudo-random walk over the operations
        let mut seed = 7u32;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ops[(seed >> 16) as usize % ops.len()](&mut pc);
            let allowed = pc.desired_lock() && pc.hold_count() == 0;
            assert_eq!(pc.actual_lock(), allowed);
        }
    }

    #[test]
    fn reconcile_without_change_only_reads() {
        let (mut pc, platform) = coordinator();
        pc.request_lock();
        let calls = platform.calls.get();
        pc.reconcile();
        pc.reconcile();
        assert_eq!(platform.calls.get(), calls);
    }

    #[test]
    fn rejected_capture_is_reflected_and_retried_on_next_trigger() {
        let (mut pc, platform) = coordinator();
        platform.reject.set(true);
        pc.on_surface_click();
        assert!(!pc.is_locked());
        assert!(!pc.actual_lock());

        platform.reject.set(false);
        pc.on_surface_click();
        assert!(pc.is_locked());
    }

    #[test]
    fn external_unlock_is_picked_up_on_lock_change() {
        let (mut pc, platform) = coordinator();
        pc.request_lock();
        // user pressed the browser's own escape
        platform.captured.set(false);
        pc.request_unlock();
        pc.on_platform_lock_change();
        assert!(!pc.actual_lock());
        assert!(!pc.is_locked());
    }

    #[test]
    fn platform_side_unlock_clears_desire_until_next_click() {
        let (mut pc, platform) = coordinator();
        pc.request_lock();
        let calls = platform.calls.get();

        platform.captured.set(false);
        pc.on_platform_lock_change();
        assert!(!pc.desired_lock());
        assert!(!pc.actual_lock());

        pc.on_visible();
        pc.hold("menu");
        pc.release("menu");
        assert_eq!(platform.calls.get(), calls, "no capture request without a click");
        assert!(!pc.is_locked());

        pc.on_surface_click();
        assert!(pc.is_locked());
    }

    #[test]
    fn own_release_keeps_desired_lock() {
        let (mut pc, _) = coordinator();
        pc.request_lock();
        pc.hold("inventory");
        pc.on_platform_lock_change();
        assert!(pc.desired_lock());
        pc.release("inventory");
        assert!(pc.is_locked());
    }

    #[test]
    fn modal_signals_drive_holds() {
        let (mut pc, _) = coordinator();
        pc.request_lock();
        pc.handle_signal(&Signal::ModalOpened { reason: "inventory".into() });
        assert!(!pc.is_locked());
        pc.handle_signal(&Signal::ModalClosed { reason: "inventory".into() });
        assert!(pc.is_locked());
    }
}
