// CONTROLLER: input, pointer arbitration, physics queries and the avatar rig
pub mod events;
pub mod footsteps;
pub mod gamepad;
pub mod input;
pub mod physics;
pub mod pointer;
pub mod rig;

pub use events::{EventBus, Signal, SignalKind, SubscriptionId};
pub use footsteps::{FootstepCadence, TrackedPosition};
pub use gamepad::{GamepadSnapshot, GamepadSource, NoGamepads};
pub use input::{InputLayer, Speeds};
pub use physics::{Aabb, BodyExtent, BoxWorld, CollisionWorld, OpenSpace};
pub use pointer::{PointerCapture, PointerCaptureCoordinator};
pub use rig::{AvatarRig, BodySource, CameraMode, CameraModeState, RigNodes, RigSnapshot, VisualBody};
