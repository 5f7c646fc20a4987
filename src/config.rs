//! Tuning constants and input binding tables.
//!
//! Everything here is read-only to the core once constructed. Hosts build a
//! [`Tuning`] explicitly (or parse one from JSON) and hand it to the input layer
//! and the rig by value or reference.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;
use serde::Deserialize;

use crate::error::ConfigError;

/// Highest belt slot index; slot 0 means "nothing selected".
pub const BELT_SLOTS: u8 = 3;

/// Near, mid and far third-person follow distances.
pub const DEFAULT_THIRD_PERSON_DISTANCES: [f32; 3] = [2.6, 4.0, 6.0];

/// Logical keyboard actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Forward,
    Back,
    Left,
    Right,
    Run,
    Crouch,
    BeltSlot,
    UseItem,
    DropItem,
    Pickup,
    PlaceItem,
    CycleBelt,
    Lighter,
    Flashlight,
    UvLight,
    IrLight,
    Interact,
    HouseLights,
    ToggleView,
    ReleasePointer,
}

impl Action {
    pub fn is_movement(self) -> bool {
        matches!(self, Action::Forward | Action::Back | Action::Left | Action::Right | Action::Run)
    }
}

/// Action → physical key codes (`KeyboardEvent.code` strings).
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct KeyBindingTable {
    bindings: HashMap<Action, Vec<String>>,
}

impl KeyBindingTable {
    pub fn new() -> Self {
        Self { bindings: HashMap::new() }
    }

    pub fn bind(mut self, action: Action, codes: &[&str]) -> Self {
        self.bindings
            .insert(action, codes.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Codes bound to `action`; `None` when the action is disabled.
    pub fn codes(&self, action: Action) -> Option<&[String]> {
        self.bindings
            .get(&action)
            .map(Vec::as_slice)
            .filter(|codes| !codes.is_empty())
    }

    pub fn matches(&self, action: Action, code: &str) -> bool {
        self.codes(action)
            .is_some_and(|codes| codes.iter().any(|c| c == code))
    }

    /// Every action bound to `code`, in a stable order.
    pub fn actions_for(&self, code: &str) -> Vec<Action> {
        let mut actions: Vec<Action> = self
            .bindings
            .iter()
            .filter(|(_, codes)| codes.iter().any(|c| c == code))
            .map(|(action, _)| *action)
            .collect();
        actions.sort_by_key(|a| *a as u8);
        actions
    }

    /// Belt slot selected by `code`, if it is bound to [`Action::BeltSlot`]
    /// and ends in a digit within the belt range.
    pub fn belt_slot(&self, code: &str) -> Option<u8> {
        if !self.matches(Action::BeltSlot, code) {
            return None;
        }
        let digit = code.chars().last()?.to_digit(10)? as u8;
        (digit <= BELT_SLOTS).then_some(digit)
    }
}

impl Default for KeyBindingTable {
    fn default() -> Self {
        Self::new()
            .bind(Action::Forward, &["KeyW", "ArrowUp"])
            .bind(Action::Back, &["KeyS", "ArrowDown"])
            .bind(Action::Left, &["KeyA", "ArrowLeft"])
            .bind(Action::Right, &["KeyD", "ArrowRight"])
            .bind(Action::Run, &["ShiftLeft", "ShiftRight"])
            .bind(Action::Crouch, &["ControlLeft", "KeyC"])
            .bind(Action::BeltSlot, &["Digit1", "Digit2", "Digit3"])
            .bind(Action::UseItem, &["KeyQ"])
            .bind(Action::DropItem, &["KeyG"])
            .bind(Action::Pickup, &["KeyF"])
            .bind(Action::PlaceItem, &["KeyB"])
            .bind(Action::CycleBelt, &["Tab"])
            .bind(Action::Lighter, &["KeyL"])
            .bind(Action::Flashlight, &["KeyT"])
            .bind(Action::UvLight, &["KeyU"])
            .bind(Action::IrLight, &["KeyI"])
            .bind(Action::Interact, &["KeyE"])
            .bind(Action::HouseLights, &["KeyH"])
            .bind(Action::ToggleView, &["KeyV"])
            .bind(Action::ReleasePointer, &["Escape"])
    }
}

/// What a gamepad button does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamepadAction {
    UseItem,
    DropItem,
    Pickup,
    CycleBelt,
    PlaceItem,
    Interact,
    Flashlight,
    Lighter,
    UvLight,
    IrLight,
    HouseLights,
    /// Toggles crouch on the rising edge.
    Crouch,
    /// Level-triggered: held means running.
    Sprint,
}

/// Standard-layout button index → action.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct GamepadButtonTable {
    buttons: BTreeMap<usize, GamepadAction>,
}

impl GamepadButtonTable {
    pub fn get(&self, button: usize) -> Option<GamepadAction> {
        self.buttons.get(&button).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, GamepadAction)> + '_ {
        self.buttons.iter().map(|(b, a)| (*b, *a))
    }
}

impl Default for GamepadButtonTable {
    fn default() -> Self {
        let buttons = [
            (0, GamepadAction::UseItem),
            (1, GamepadAction::DropItem),
            (2, GamepadAction::Pickup),
            (3, GamepadAction::CycleBelt),
            (4, GamepadAction::PlaceItem),
            (5, GamepadAction::Interact),
            (6, GamepadAction::Lighter),
            (7, GamepadAction::HouseLights),
            (10, GamepadAction::Sprint),
            (11, GamepadAction::Crouch),
            (12, GamepadAction::Flashlight),
            (13, GamepadAction::Flashlight),
            (14, GamepadAction::UvLight),
            (15, GamepadAction::IrLight),
        ];
        Self { buttons: buttons.into_iter().collect() }
    }
}

/// Hand anchor placement relative to the head node.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HandOffset {
    pub right: f32,
    pub down: f32,
    pub forward: f32,
}

impl HandOffset {
    /// Local offset in head space (-Z is forward).
    pub fn to_local(self) -> Vec3 {
        Vec3::new(self.right, -self.down, -self.forward)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub speed_walk: f32,
    pub speed_run: f32,
    /// Radians per pixel of relative pointer motion.
    pub mouse_sensitivity: f32,
    pub stride_walk: f32,
    pub stride_run: f32,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub third_person_distances: Vec<f32>,
    pub third_person_height: f32,
    pub eye_height: f32,
    pub hand_offset: HandOffset,
    pub gravity: f32,
    pub step_height: f32,
    pub ground_probe_length: f32,
    /// Upper bound for a single frame step, in seconds.
    pub max_dt: f32,
    pub body_radius: f32,
    pub body_height: f32,
    pub gamepad_dead_zone: f32,
    pub gamepad_names: Vec<String>,
    pub default_spawn: Vec3,
    pub body_asset: String,
    pub bindings: KeyBindingTable,
    pub gamepad_buttons: GamepadButtonTable,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            speed_walk: 1.8,
            speed_run: 3.6,
            mouse_sensitivity: 0.002,
            stride_walk: 0.7,
            stride_run: 0.95,
            fov: 70f32.to_radians(),
            third_person_distances: DEFAULT_THIRD_PERSON_DISTANCES.to_vec(),
            third_person_height: 0.25,
            eye_height: 1.6,
            hand_offset: HandOffset { right: 0.25, down: 0.22, forward: 0.45 },
            gravity: -9.81,
            step_height: 0.3,
            ground_probe_length: 0.35,
            max_dt: 0.05,
            body_radius: 0.35,
            body_height: 1.8,
            gamepad_dead_zone: 0.25,
            gamepad_names: vec![
                "STANDARD GAMEPAD".to_string(),
                "Xbox".to_string(),
                "DualSense".to_string(),
                "DualShock".to_string(),
                "Wireless Controller".to_string(),
            ],
            default_spawn: Vec3::new(0.0, 1.8, 0.0),
            body_asset: "player".to_string(),
            bindings: KeyBindingTable::default(),
            gamepad_buttons: GamepadButtonTable::default(),
        }
    }
}

impl Tuning {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.third_person_distances.is_empty()
            || self
                .third_person_distances
                .iter()
                .any(|d| !d.is_finite() || *d <= 0.0)
        {
            return Err(ConfigError::InvalidDistanceList);
        }
        if !(0.0..1.0).contains(&self.gamepad_dead_zone) {
            return Err(ConfigError::InvalidDeadZone(self.gamepad_dead_zone));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belt_slot_parses_trailing_digit() {
        let table = KeyBindingTable::default();
        assert_eq!(table.belt_slot("Digit2"), Some(2));
        assert_eq!(table.belt_slot("Digit4"), None, "unbound code");
        assert_eq!(table.belt_slot("KeyW"), None);
    }

    #[test]
    fn belt_slot_rejects_out_of_range_digits() {
        let table = KeyBindingTable::new().bind(Action::BeltSlot, &["Digit7", "Numpad0"]);
        assert_eq!(table.belt_slot("Digit7"), None);
        assert_eq!(table.belt_slot("Numpad0"), Some(0));
    }

    #[test]
    fn empty_binding_counts_as_disabled() {
        let table = KeyBindingTable::new().bind(Action::Lighter, &[]);
        assert!(table.codes(Action::Lighter).is_none());
        assert!(!table.matches(Action::Lighter, "KeyL"));
    }

    #[test]
    fn tuning_from_json_overrides_and_keeps_defaults() {
        let tuning = Tuning::from_json(
            r#"{ "speed_walk": 2.5, "bindings": { "forward": ["KeyZ"] }, "gamepad_buttons": { "0": "crouch" } }"#,
        )
        .unwrap();
        assert_eq!(tuning.speed_walk, 2.5);
        assert_eq!(tuning.speed_run, 3.6);
        assert!(tuning.bindings.matches(Action::Forward, "KeyZ"));
        assert!(tuning.bindings.codes(Action::Back).is_none());
        assert_eq!(tuning.gamepad_buttons.get(0), Some(GamepadAction::Crouch));
    }

    #[test]
    fn tuning_rejects_empty_distance_list() {
        let err = Tuning::from_json(r#"{ "third_person_distances": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDistanceList));
    }

    #[test]
    fn tuning_rejects_bad_dead_zone() {
        let err = Tuning::from_json(r#"{ "gamepad_dead_zone": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDeadZone(_)));
    }
}
