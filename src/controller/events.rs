//! In-process signal bus.
//!
//! Publishers do not know who listens. Dispatch is synchronous, in
//! subscription order, to the subscribers registered at publish time.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Everything the avatar core publishes or listens for.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    SlotSelect { slot: u8 },
    UseItem,
    DropItem,
    Pickup,
    PlaceItem,
    CycleBelt,
    CrouchChanged { crouching: bool },
    ToggleLighter,
    ToggleFlashlight,
    ToggleUv,
    ToggleIr,
    DoorInteract,
    ToggleHouseLights,
    /// `cycle` asks for the next third-person distance instead of a mode flip.
    ViewToggle { cycle: bool },
    Footstep { running: bool },
    /// A UI surface wants the pointer free.
    ModalOpened { reason: String },
    ModalClosed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    SlotSelect,
    UseItem,
    DropItem,
    Pickup,
    PlaceItem,
    CycleBelt,
    CrouchChanged,
    ToggleLighter,
    ToggleFlashlight,
    ToggleUv,
    ToggleIr,
    DoorInteract,
    ToggleHouseLights,
    ViewToggle,
    Footstep,
    ModalOpened,
    ModalClosed,
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::SlotSelect { .. } => SignalKind::SlotSelect,
            Signal::UseItem => SignalKind::UseItem,
            Signal::DropItem => SignalKind::DropItem,
            Signal::Pickup => SignalKind::Pickup,
            Signal::PlaceItem => SignalKind::PlaceItem,
            Signal::CycleBelt => SignalKind::CycleBelt,
            Signal::CrouchChanged { .. } => SignalKind::CrouchChanged,
            Signal::ToggleLighter => SignalKind::ToggleLighter,
            Signal::ToggleFlashlight => SignalKind::ToggleFlashlight,
            Signal::ToggleUv => SignalKind::ToggleUv,
            Signal::ToggleIr => SignalKind::ToggleIr,
            Signal::DoorInteract => SignalKind::DoorInteract,
            Signal::ToggleHouseLights => SignalKind::ToggleHouseLights,
            Signal::ViewToggle { .. } => SignalKind::ViewToggle,
            Signal::Footstep { .. } => SignalKind::Footstep,
            Signal::ModalOpened { .. } => SignalKind::ModalOpened,
            Signal::ModalClosed { .. } => SignalKind::ModalClosed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&Signal)>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<SignalKind>,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<Vec<Subscriber>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every signal.
    pub fn subscribe(&self, handler: impl Fn(&Signal) + 'static) -> SubscriptionId {
        self.insert(None, Rc::new(handler))
    }

    /// Receive only signals of `kind`.
    pub fn subscribe_to(
        &self,
        kind: SignalKind,
        handler: impl Fn(&Signal) + 'static,
    ) -> SubscriptionId {
        self.insert(Some(kind), Rc::new(handler))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.borrow_mut().retain(|s| s.id != id);
    }

    pub fn publish(&self, signal: Signal) {
        tracing::trace!(?signal, "publish");
        let kind = signal.kind();
        // Snapshot so handlers may subscribe or publish while being dispatched.
        let handlers: Vec<Handler> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|s| s.filter.map_or(true, |k| k == kind))
            .map(|s| s.handler.clone())
            .collect();
        for handler in handlers {
            handler(&signal);
        }
    }

    fn insert(&self, filter: Option<SignalKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push(Subscriber { id, filter, handler });
        id
    }
}
