//! Asset loader contract for the avatar's visual body.
//!
//! Loading is asynchronous but single-threaded: a loader hands back an
//! [`AssetRequest`] immediately and completes it later through the paired
//! [`AssetResolver`]. The rig polls the request from its own tick, so the
//! completion is always observed on the same loop that drives integration.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec3;
use serde::Deserialize;

use crate::error::AssetError;

/// One named sub-part of a body, placed relative to the body origin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BodyPart {
    pub name: String,
    #[serde(default)]
    pub mesh: Option<String>,
    #[serde(default)]
    pub offset: Vec3,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadedBody {
    pub name: String,
    pub parts: Vec<BodyPart>,
}

impl LoadedBody {
    /// Parse a JSON body manifest; a body without parts counts as missing.
    pub fn from_manifest(json: &str) -> Result<Self, AssetError> {
        let body: LoadedBody = serde_json::from_str(json)?;
        if body.parts.is_empty() {
            return Err(AssetError::Empty(body.name));
        }
        Ok(body)
    }
}

type Slot = Rc<RefCell<Option<Result<LoadedBody, AssetError>>>>;

/// Receiving half of a body load.
#[derive(Debug)]
pub struct AssetRequest {
    slot: Slot,
}

/// Completing half of a body load.
#[derive(Debug)]
pub struct AssetResolver {
    slot: Slot,
}

impl AssetRequest {
    pub fn pending() -> (AssetResolver, AssetRequest) {
        let slot: Slot = Rc::new(RefCell::new(None));
        (AssetResolver { slot: slot.clone() }, AssetRequest { slot })
    }

    pub fn ready(result: Result<LoadedBody, AssetError>) -> AssetRequest {
        let (resolver, request) = Self::pending();
        resolver.resolve(result);
        request
    }

    /// Takes the outcome once it is available.
    pub fn poll(&self) -> Option<Result<LoadedBody, AssetError>> {
        self.slot.borrow_mut().take()
    }
}

impl AssetResolver {
    pub fn resolve(self, result: Result<LoadedBody, AssetError>) {
        *self.slot.borrow_mut() = Some(result);
    }
}

pub trait AssetLoader {
    fn load(&self, name: &str) -> AssetRequest;
}

/// Loader backed by bodies registered up front; resolves immediately.
#[derive(Debug, Default)]
pub struct MemoryAssetLoader {
    bodies: HashMap<String, LoadedBody>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: LoadedBody) -> Self {
        self.bodies.insert(body.name.clone(), body);
        self
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn load(&self, name: &str) -> AssetRequest {
        let result = self
            .bodies
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()));
        AssetRequest::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_yields_outcome_once() {
        let (resolver, request) = AssetRequest::pending();
        assert!(request.poll().is_none());
        resolver.resolve(Err(AssetError::NotFound("x".into())));
        assert!(matches!(request.poll(), Some(Err(AssetError::NotFound(_)))));
        assert!(request.poll().is_none());
    }

    #[test]
    fn manifest_without_parts_is_rejected() {
        let err = LoadedBody::from_manifest(r#"{ "name": "player", "parts": [] }"#).unwrap_err();
        assert!(matches!(err, AssetError::Empty(_)));
    }

    #[test]
    fn manifest_parses_offsets() {
        let body = LoadedBody::from_manifest(
            r#"{ "name": "player", "parts": [ { "name": "torso", "offset": [0.0, 1.1, 0.0] } ] }"#,
        )
        .unwrap();
        assert_eq!(body.parts[0].offset, Vec3::new(0.0, 1.1, 0.0));
        assert_eq!(body.parts[0].mesh, None);
    }

    #[test]
    fn memory_loader_reports_missing_bodies() {
        let loader = MemoryAssetLoader::new();
        assert!(matches!(loader.load("ghost").poll(), Some(Err(AssetError::NotFound(_)))));
    }
}
