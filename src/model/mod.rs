// MODEL: avatar data, transforms and the scene slice the core works on
pub mod asset;
pub mod camera;
pub mod intent;
pub mod scene;
pub mod transform;

pub use asset::{AssetLoader, AssetRequest, AssetResolver, BodyPart, LoadedBody, MemoryAssetLoader};
pub use camera::{Camera, CameraUniform};
pub use intent::{DirectionalHold, IntentState, MovementFlags};
pub use scene::Scene;
pub use transform::{NodeId, NodeShape, TransformNode, TransformTree};
