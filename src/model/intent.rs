/// Directional and sprint holds from a single device.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionalHold {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub running: bool,
}

/// What the player currently wants to do.
///
/// Keyboard and gamepad keep separate hold records so one device releasing a
/// direction never cancels the other device's hold. Readers should go through
/// [`IntentState::movement_flags`], which merges both.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct IntentState {
    pub keys: DirectionalHold,
    pub pad: DirectionalHold,
    /// Toggled by gamepad, held by keyboard.
    pub crouch: bool,
    /// 0 means no belt item selected.
    pub selected_slot: u8,
}

impl IntentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn movement_flags(&self) -> MovementFlags {
        MovementFlags {
            forward: self.keys.forward || self.pad.forward,
            back: self.keys.back || self.pad.back,
            left: self.keys.left || self.pad.left,
            right: self.keys.right || self.pad.right,
            running: self.keys.running || self.pad.running,
            crouch: self.crouch,
        }
    }
}

/// Merged snapshot handed to the rig each tick.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementFlags {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub running: bool,
    pub crouch: bool,
}

impl MovementFlags {
    pub fn is_moving(&self) -> bool {
        self.forward || self.back || self.left || self.right
    }

    /// Heading-relative intent as (right, forward); opposing holds cancel.
    pub fn axes(&self) -> (f32, f32) {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;
        (axis(self.right, self.left), axis(self.forward, self.back))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_merge_with_or() {
        let mut intent = IntentState::new();
        intent.keys.forward = true;
        intent.pad.back = true;
        intent.pad.running = true;
        let flags = intent.movement_flags();
        assert!(flags.forward && flags.back && flags.running);
        assert_eq!(flags.axes(), (0.0, 0.0));
    }

    #[test]
    fn axes_follow_holds() {
        let flags = MovementFlags { forward: true, left: true, ..Default::default() };
        assert_eq!(flags.axes(), (-1.0, 1.0));
        assert!(flags.is_moving());
        assert!(!MovementFlags::default().is_moving());
    }
}
