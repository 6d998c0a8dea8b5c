//! Scenes - attributed objects and a target.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Errors for malformed scenes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// A scene needs at least one object.
    #[error("scene has no objects")]
    Empty,

    /// Target index outside the object list.
    #[error("target index {target_idx} out of range for {len} objects")]
    TargetOutOfRange {
        /// Offending index
        target_idx: usize,
        /// Number of objects
        len: usize,
    },

    /// Two objects share the same attribute tuple.
    #[error("object {index} duplicates an earlier object")]
    DuplicateObject {
        /// Index of the repeated object
        index: usize,
    },
}

/// An object with color, shape and size attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneObject {
    /// Color value
    pub color: String,
    /// Shape value
    pub shape: String,
    /// Size value
    pub size: String,
}

impl SceneObject {
    /// Create an object.
    pub fn new(color: impl Into<String>, shape: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            shape: shape.into(),
            size: size.into(),
        }
    }

    /// `color=red, shape=circle, size=small`
    pub fn describe(&self) -> String {
        format!("color={}, shape={}, size={}", self.color, self.shape, self.size)
    }
}

#[derive(Deserialize)]
struct RawScene {
    objects: Vec<SceneObject>,
    target_idx: usize,
}

/// A fixed-size ordered set of distinct objects plus a target index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawScene")]
pub struct Scene {
    objects: Vec<SceneObject>,
    target_idx: usize,
}

impl Scene {
    /// Build a scene, checking distinctness and the target range.
    pub fn new(objects: Vec<SceneObject>, target_idx: usize) -> Result<Self, SceneError> {
        if objects.is_empty() {
            return Err(SceneError::Empty);
        }
        if target_idx >= objects.len() {
            return Err(SceneError::TargetOutOfRange {
                target_idx,
                len: objects.len(),
            });
        }
        let mut seen = HashSet::with_capacity(objects.len());
        for (index, obj) in objects.iter().enumerate() {
            if !seen.insert(obj) {
                return Err(SceneError::DuplicateObject { index });
            }
        }
        Ok(Self { objects, target_idx })
    }

    /// Objects in order.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Index of the target object.
    pub fn target_idx(&self) -> usize {
        self.target_idx
    }

    /// The target object.
    pub fn target(&self) -> &SceneObject {
        &self.objects[self.target_idx]
    }

    /// Number of objects (K).
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Always false for a constructed scene.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// One `i: color=..., shape=..., size=...` line per object.
    pub fn describe(&self) -> String {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}: {}", i, o.describe()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TryFrom<RawScene> for Scene {
    type Error = SceneError;

    fn try_from(raw: RawScene) -> Result<Self, Self::Error> {
        Scene::new(raw.objects, raw.target_idx)
    }
}

/// Attribute values objects are drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Color values
    pub colors: Vec<String>,
    /// Shape values
    pub shapes: Vec<String>,
    /// Size values
    pub sizes: Vec<String>,
}

impl Vocabulary {
    /// Number of distinct attribute tuples.
    pub fn distinct_objects(&self) -> usize {
        self.colors.len() * self.shapes.len() * self.sizes.len()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            colors: owned(&["red", "blue", "green", "yellow", "black", "white"]),
            shapes: owned(&["circle", "square", "triangle", "star", "hexagon", "diamond"]),
            sizes: owned(&["small", "medium", "large", "huge"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_objects() -> Vec<SceneObject> {
        vec![
            SceneObject::new("red", "circle", "small"),
            SceneObject::new("blue", "square", "large"),
        ]
    }

    #[test]
    fn test_scene_creation() {
        let scene = Scene::new(two_objects(), 0).unwrap();
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.target().color, "red");
        assert_eq!(
            scene.describe(),
            "0: color=red, shape=circle, size=small\n1: color=blue, shape=square, size=large"
        );
    }

    #[test]
    fn test_scene_rejects_bad_target() {
        assert_eq!(
            Scene::new(two_objects(), 2),
            Err(SceneError::TargetOutOfRange { target_idx: 2, len: 2 })
        );
        assert_eq!(Scene::new(vec![], 0), Err(SceneError::Empty));
    }

    #[test]
    fn test_scene_rejects_duplicates() {
        let mut objects = two_objects();
        objects.push(SceneObject::new("red", "circle", "small"));
        assert_eq!(
            Scene::new(objects, 0),
            Err(SceneError::DuplicateObject { index: 2 })
        );
    }

    #[test]
    fn test_scene_deserialization_validates() {
        let ok = r#"{"objects":[{"color":"red","shape":"circle","size":"small"}],"target_idx":0}"#;
        assert!(serde_json::from_str::<Scene>(ok).is_ok());

        let bad = r#"{"objects":[{"color":"red","shape":"circle","size":"small"}],"target_idx":3}"#;
        assert!(serde_json::from_str::<Scene>(bad).is_err());
    }

    #[test]
    fn test_default_vocabulary() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.distinct_objects(), 6 * 6 * 4);
    }
}
