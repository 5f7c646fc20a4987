//! Gamepad sampling.
//!
//! Sources return plain snapshots; the input layer turns them into intent and
//! fires button actions on rising edges.

use crate::config::GamepadAction;
use crate::controller::events::Signal;
use crate::error::DeviceError;
use crate::model::DirectionalHold;

/// One controller as seen by a single poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadSnapshot {
    pub id: String,
    pub connected: bool,
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
}

pub trait GamepadSource {
    fn gamepads(&self) -> Result<Vec<GamepadSnapshot>, DeviceError>;
}

/// For hosts without gamepad support.
#[derive(Debug, Default)]
pub struct NoGamepads;

impl GamepadSource for NoGamepads {
    fn gamepads(&self) -> Result<Vec<GamepadSnapshot>, DeviceError> {
        Ok(Vec::new())
    }
}

/// First connected controller whose id contains one of `names` (case-insensitive).
pub fn find_recognized<'a>(
    pads: &'a [GamepadSnapshot],
    names: &[String],
) -> Option<&'a GamepadSnapshot> {
    pads.iter().filter(|p| p.connected).find(|p| {
        let id = p.id.to_ascii_lowercase();
        names.iter().any(|n| id.contains(&n.to_ascii_lowercase()))
    })
}

/// Left stick → directional holds. Below the dead zone both opposing flags
/// are released. Sprint is left untouched.
pub fn stick_to_hold(pad: &GamepadSnapshot, dead_zone: f32, hold: &mut DirectionalHold) {
    let x = pad.axes.first().copied().unwrap_or(0.0);
    let y = pad.axes.get(1).copied().unwrap_or(0.0);
    hold.left = x <= -dead_zone;
    hold.right = x >= dead_zone;
    // stick up reads negative
    hold.forward = y <= -dead_zone;
    hold.back = y >= dead_zone;
}

/// Tracks button levels between polls for edge detection.
#[derive(Debug, Default)]
pub struct ButtonEdges {
    previous: Vec<bool>,
}

impl ButtonEdges {
    pub fn rising(&self, button: usize, buttons: &[bool]) -> bool {
        let now = buttons.get(button).copied().unwrap_or(false);
        let before = self.previous.get(button).copied().unwrap_or(false);
        now && !before
    }

    pub fn store(&mut self, buttons: &[bool]) {
        self.previous.clear();
        self.previous.extend_from_slice(buttons);
    }

    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

/// Signal for one-shot button actions. Crouch and sprint carry state and are
/// handled by the input layer.
pub fn action_signal(action: GamepadAction) -> Option<Signal> {
    match action {
        GamepadAction::UseItem => Some(Signal::UseItem),
        GamepadAction::DropItem => Some(Signal::DropItem),
        GamepadAction::Pickup => Some(Signal::Pickup),
        GamepadAction::CycleBelt => Some(Signal::CycleBelt),
        GamepadAction::PlaceItem => Some(Signal::PlaceItem),
        GamepadAction::Interact => Some(Signal::DoorInteract),
        GamepadAction::Flashlight => Some(Signal::ToggleFlashlight),
        GamepadAction::Lighter => Some(Signal::ToggleLighter),
        GamepadAction::UvLight => Some(Signal::ToggleUv),
        GamepadAction::IrLight => Some(Signal::ToggleIr),
        GamepadAction::HouseLights => Some(Signal::ToggleHouseLights),
        GamepadAction::Crouch | GamepadAction::Sprint => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(id: &str, connected: bool) -> GamepadSnapshot {
        GamepadSnapshot { id: id.to_string(), connected, ..Default::default() }
    }

    #[test]
    fn finds_first_connected_recognized_pad() {
        let names = vec!["xbox".to_string()];
        let pads = vec![pad("Xbox Wireless", false), pad("Joystick", true), pad("XBOX 360", true)];
        assert_eq!(find_recognized(&pads, &names).map(|p| p.id.as_str()), Some("XBOX 360"));
        assert!(find_recognized(&[], &names).is_none());
    }

    #[test]
    fn stick_respects_dead_zone() {
        let mut hold = DirectionalHold { running: true, ..Default::default() };
        let mut p = pad("x", true);
        p.axes = vec![0.2, -0.9];
        stick_to_hold(&p, 0.25, &mut hold);
        assert!(hold.forward && !hold.back && !hold.left && !hold.right);
        assert!(hold.running, "sprint is not driven by the stick");

        p.axes = vec![0.6, 0.1];
        stick_to_hold(&p, 0.25, &mut hold);
        assert!(hold.right && !hold.forward && !hold.back);
    }

    #[test]
    fn rising_edge_fires_once_per_press() {
        let mut edges = ButtonEdges::default();
        let pressed = [true, false];
        assert!(edges.rising(0, &pressed));
        edges.store(&pressed);
        assert!(!edges.rising(0, &pressed));
        edges.store(&[false, false]);
        assert!(edges.rising(0, &pressed));
        assert!(!edges.rising(5, &pressed), "missing buttons read as released");
    }
}
