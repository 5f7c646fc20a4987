/// Device-independent input handling: keyboard and gamepad feed one intent
/// record and one stream of action signals.
use std::collections::HashSet;
use std::rc::Rc;

use crate::config::{Action, GamepadAction, Tuning};
use crate::controller::events::{EventBus, Signal};
use crate::controller::gamepad::{self, ButtonEdges, GamepadSource};
use crate::model::{IntentState, MovementFlags};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speeds {
    pub walk: f32,
    pub run: f32,
}

pub struct InputLayer {
    tuning: Rc<Tuning>,
    bus: Rc<EventBus>,
    intent: IntentState,
    pressed_keys: HashSet<String>,
    text_capture: bool,
    pad_edges: ButtonEdges,
}

impl InputLayer {
    pub fn new(tuning: Rc<Tuning>, bus: Rc<EventBus>) -> Self {
        Self {
            tuning,
            bus,
            intent: IntentState::new(),
            pressed_keys: HashSet::new(),
            text_capture: false,
            pad_edges: ButtonEdges::default(),
        }
    }

    pub fn intent(&self) -> &IntentState {
        &self.intent
    }

    pub fn is_key_pressed(&self, code: &str) -> bool {
        self.pressed_keys.contains(code)
    }

    /// While a text field has focus, movement and sprint keys do not move the avatar.
    pub fn set_text_capture(&mut self, capturing: bool) {
        self.text_capture = capturing;
    }

    pub fn is_release_pointer(&self, code: &str) -> bool {
        self.tuning.bindings.matches(Action::ReleasePointer, code)
    }

    pub fn on_key_down(&mut self, code: &str) {
        // Browsers repeat keydown while held; only the first one triggers actions.
        let repeat = !self.pressed_keys.insert(code.to_string());

        if let Some(slot) = self.tuning.bindings.belt_slot(code) {
            if !repeat {
                self.intent.selected_slot = slot;
                self.bus.publish(Signal::SlotSelect { slot });
            }
            return;
        }

        for action in self.tuning.bindings.actions_for(code) {
            if action.is_movement() {
                if !self.text_capture {
                    self.set_key_hold(action, true);
                }
                continue;
            }
            if repeat {
                continue;
            }
            match action {
                Action::Crouch => self.set_crouch(true),
                Action::ToggleView => {
                    let cycle = self.run_key_held();
                    self.bus.publish(Signal::ViewToggle { cycle });
                }
                other => {
                    if let Some(signal) = key_signal(other) {
                        self.bus.publish(signal);
                    }
                }
            }
        }
    }

    pub fn on_key_up(&mut self, code: &str) {
        self.pressed_keys.remove(code);
        for action in self.tuning.bindings.actions_for(code) {
            if action.is_movement() {
                // Released even under text capture so a hold never sticks.
                self.set_key_hold(action, false);
            } else if action == Action::Crouch && !self.crouch_key_held() {
                self.set_crouch(false);
            }
        }
    }

    /// Focus loss: forget every held key.
    pub fn clear_held(&mut self) {
        let crouch_held = self.crouch_key_held();
        self.pressed_keys.clear();
        self.intent.keys = Default::default();
        if crouch_held {
            self.set_crouch(false);
        }
    }

    /// Sample the first recognized controller. Read failures and missing
    /// controllers count as "no input this tick".
    pub fn poll_gamepad(&mut self, source: &dyn GamepadSource) {
        let pads = match source.gamepads() {
            Ok(pads) => pads,
            Err(e) => {
                tracing::trace!("gamepad read failed: {e}");
                return;
            }
        };
        let Some(pad) = gamepad::find_recognized(&pads, &self.tuning.gamepad_names) else {
            if self.intent.pad != Default::default() {
                tracing::debug!("gamepad gone, releasing its holds");
            }
            self.intent.pad = Default::default();
            self.pad_edges.reset();
            return;
        };

        gamepad::stick_to_hold(pad, self.tuning.gamepad_dead_zone, &mut self.intent.pad);

        let tuning = self.tuning.clone();
        for (button, action) in tuning.gamepad_buttons.iter() {
            match action {
                GamepadAction::Sprint => {
                    self.intent.pad.running = pad.buttons.get(button).copied().unwrap_or(false);
                }
                _ if !self.pad_edges.rising(button, &pad.buttons) => {}
                GamepadAction::Crouch => {
                    let crouching = !self.intent.crouch;
                    self.set_crouch(crouching);
                }
                other => {
                    if let Some(signal) = gamepad::action_signal(other) {
                        self.bus.publish(signal);
                    }
                }
            }
        }
        self.pad_edges.store(&pad.buttons);
    }

    pub fn get_movement_flags(&self) -> MovementFlags {
        self.intent.movement_flags()
    }

    pub fn get_speeds(&self) -> Speeds {
        Speeds { walk: self.tuning.speed_walk, run: self.tuning.speed_run }
    }

    fn set_key_hold(&mut self, action: Action, held: bool) {
        let keys = &mut self.intent.keys;
        match action {
            Action::Forward => keys.forward = held,
            Action::Back => keys.back = held,
            Action::Left => keys.left = held,
            Action::Right => keys.right = held,
            Action::Run => keys.running = held,
            _ => {}
        }
    }

    fn set_crouch(&mut self, crouching: bool) {
        if self.intent.crouch != crouching {
            self.intent.crouch = crouching;
            self.bus.publish(Signal::CrouchChanged { crouching });
        }
    }

    fn run_key_held(&self) -> bool {
        self.pressed_keys
            .iter()
            .any(|k| self.tuning.bindings.matches(Action::Run, k))
    }

    fn crouch_key_held(&self) -> bool {
        self.pressed_keys
            .iter()
            .any(|k| self.tuning.bindings.matches(Action::Crouch, k))
    }
}

fn key_signal(action: Action) -> Option<Signal> {
    match action {
        Action::UseItem => Some(Signal::UseItem),
        Action::DropItem => Some(Signal::DropItem),
        Action::Pickup => Some(Signal::Pickup),
        Action::PlaceItem => Some(Signal::PlaceItem),
        Action::CycleBelt => Some(Signal::CycleBelt),
        Action::Lighter => Some(Signal::ToggleLighter),
        Action::Flashlight => Some(Signal::ToggleFlashlight),
        Action::UvLight => Some(Signal::ToggleUv),
        Action::IrLight => Some(Signal::ToggleIr),
        Action::Interact => Some(Signal::DoorInteract),
        Action::HouseLights => Some(Signal::ToggleHouseLights),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::controller::gamepad::GamepadSnapshot;
    use crate::error::DeviceError;

    fn layer() -> (InputLayer, Rc<RefCell<Vec<Signal>>>) {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |s| sink.borrow_mut().push(s.clone()));
        (InputLayer::new(Rc::new(Tuning::default()), bus), seen)
    }

    struct FixedPads(RefCell<Vec<GamepadSnapshot>>);

    impl GamepadSource for FixedPads {
        fn gamepads(&self) -> Result<Vec<GamepadSnapshot>, DeviceError> {
            Ok(self.0.borrow().clone())
        }
    }

    struct NoGamepadApi;

    impl GamepadSource for NoGamepadApi {
        fn gamepads(&self) -> Result<Vec<GamepadSnapshot>, DeviceError> {
            Err(DeviceError::Unavailable)
        }
    }

    struct BrokenPads;

    impl GamepadSource for BrokenPads {
        fn gamepads(&self) -> Result<Vec<GamepadSnapshot>, DeviceError> {
            Err(DeviceError::Query("permission denied".into()))
        }
    }

    fn xbox(axes: [f32; 2], pressed: &[usize]) -> GamepadSnapshot {
        let mut buttons = vec![false; 16];
        for b in pressed {
            buttons[*b] = true;
        }
        GamepadSnapshot {
            id: "Xbox Wireless Controller".into(),
            connected: true,
            axes: axes.to_vec(),
            buttons,
        }
    }

    #[test]
    fn movement_keys_set_and_clear_flags() {
        let (mut input, _) = layer();
        input.on_key_down("KeyW");
        input.on_key_down("ShiftLeft");
        let flags = input.get_movement_flags();
        assert!(flags.forward && flags.running);
        input.on_key_up("KeyW");
        assert!(!input.get_movement_flags().forward);
    }

    #[test]
    fn text_capture_ignores_movement_but_records_key() {
        let (mut input, _) = layer();
        input.set_text_capture(true);
        input.on_key_down("KeyW");
        assert!(!input.get_movement_flags().forward);
        assert!(input.is_key_pressed("KeyW"));
        input.on_key_up("KeyW");
        assert!(!input.is_key_pressed("KeyW"));
    }

    #[test]
    fn belt_slot_emits_and_stops() {
        let (mut input, seen) = layer();
        input.on_key_down("Digit2");
        assert_eq!(*seen.borrow(), vec![Signal::SlotSelect { slot: 2 }]);
        assert_eq!(input.intent().selected_slot, 2);
    }

    #[test]
    fn toggles_fire_on_key_down_only() {
        let (mut input, seen) = layer();
        input.on_key_down("KeyT");
        input.on_key_down("KeyT");
        input.on_key_up("KeyT");
        assert_eq!(*seen.borrow(), vec![Signal::ToggleFlashlight]);
    }

    #[test]
    fn keyboard_crouch_is_held_not_toggled() {
        let (mut input, seen) = layer();
        input.on_key_down("KeyC");
        assert!(input.get_movement_flags().crouch);
        input.on_key_up("KeyC");
        assert!(!input.get_movement_flags().crouch);
        assert_eq!(
            *seen.borrow(),
            vec![
                Signal::CrouchChanged { crouching: true },
                Signal::CrouchChanged { crouching: false }
            ]
        );
    }

    #[test]
    fn view_toggle_cycles_with_shift() {
        let (mut input, seen) = layer();
        input.on_key_down("KeyV");
        input.on_key_up("KeyV");
        input.on_key_down("ShiftRight");
        input.on_key_down("KeyV");
        assert_eq!(
            *seen.borrow(),
            vec![Signal::ViewToggle { cycle: false }, Signal::ViewToggle { cycle: true }]
        );
    }

    #[test]
    fn clear_held_releases_everything() {
        let (mut input, _) = layer();
        input.on_key_down("KeyA");
        input.on_key_down("ControlLeft");
        input.clear_held();
        let flags = input.get_movement_flags();
        assert!(!flags.left && !flags.crouch);
        assert!(!input.is_key_pressed("KeyA"));
    }

    #[test]
    fn gamepad_stick_and_keyboard_merge() {
        let (mut input, _) = layer();
        let pads = FixedPads(RefCell::new(vec![xbox([0.0, 0.8], &[])]));
        input.on_key_down("KeyW");
        input.poll_gamepad(&pads);
        let flags = input.get_movement_flags();
        assert!(flags.forward && flags.back, "two sources may oppose each other");

        *pads.0.borrow_mut() = vec![xbox([0.1, 0.1], &[])];
        input.poll_gamepad(&pads);
        let flags = input.get_movement_flags();
        assert!(flags.forward && !flags.back, "stick release keeps the key hold");
    }

    #[test]
    fn gamepad_buttons_fire_on_rising_edge() {
        let (mut input, seen) = layer();
        let pads = FixedPads(RefCell::new(vec![xbox([0.0, 0.0], &[0, 12])]));
        input.poll_gamepad(&pads);
        input.poll_gamepad(&pads);
        assert_eq!(*seen.borrow(), vec![Signal::UseItem, Signal::ToggleFlashlight]);
    }

    #[test]
    fn gamepad_crouch_toggles_and_sprint_is_level() {
        let (mut input, _) = layer();
        let pads = FixedPads(RefCell::new(vec![xbox([0.0, 0.0], &[10, 11])]));
        input.poll_gamepad(&pads);
        assert!(input.get_movement_flags().crouch);
        assert!(input.get_movement_flags().running);

        *pads.0.borrow_mut() = vec![xbox([0.0, 0.0], &[])];
        input.poll_gamepad(&pads);
        assert!(input.get_movement_flags().crouch, "crouch stays toggled");
        assert!(!input.get_movement_flags().running);

        *pads.0.borrow_mut() = vec![xbox([0.0, 0.0], &[11])];
        input.poll_gamepad(&pads);
        assert!(!input.get_movement_flags().crouch);
    }

    #[test]
    fn gamepad_failures_and_absence_are_harmless() {
        let (mut input, seen) = layer();
        input.poll_gamepad(&BrokenPads);
        input.poll_gamepad(&NoGamepadApi);
        input.poll_gamepad(&FixedPads(RefCell::new(Vec::new())));
        assert_eq!(input.get_movement_flags(), MovementFlags::default());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn speeds_come_from_tuning() {
        let (input, _) = layer();
        assert_eq!(input.get_speeds(), Speeds { walk: 1.8, run: 3.6 });
    }
}
