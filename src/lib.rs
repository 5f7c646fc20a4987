// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod logging;

// MVC Architecture
pub mod model;
pub mod controller;

// Browser host
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::{Action, GamepadAction, KeyBindingTable, Tuning};
pub use error::{AssetError, ConfigError, DeviceError};
pub use frame_loop::{AvatarCore, FrameLoopContext};
