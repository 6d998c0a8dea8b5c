//! Messages, per-scene examples and few-shot bundles.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scene::Scene;

/// A speaker message, claimed legal under the grammar in use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(String);

impl Message {
    /// Wrap message text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Message text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// True for the placeholder recorded on a failed scene.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Outcome of one speaker→listener exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// The scene played
    pub scene: Scene,
    /// Speaker output (empty on failure)
    pub message: Message,
    /// Listener's index (0 on failure)
    pub prediction: usize,
    /// Whether the prediction hit the target
    pub correct: bool,
    /// Oracle failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Speaker demonstration: scene and the message to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerShot {
    /// Demonstration scene
    pub scene: Scene,
    /// Message for its target
    pub message: Message,
}

/// Listener demonstration: message and the index it denotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerShot {
    /// Scene the message was produced for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<Scene>,
    /// Demonstrated message
    pub message: Message,
    /// Index the message identifies
    pub answer: usize,
}

/// Few-shot demonstrations attached to speaker and listener calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FewShots {
    /// Speaker demonstrations
    #[serde(default)]
    pub speaker: Vec<SpeakerShot>,
    /// Listener demonstrations
    #[serde(default)]
    pub listener: Vec<ListenerShot>,
}

impl FewShots {
    /// No demonstrations at all.
    pub fn is_empty(&self) -> bool {
        self.speaker.is_empty() && self.listener.is_empty()
    }

    /// Replace each side of `current` that this bundle carries; empty sides
    /// keep the current shots.
    pub fn over(self, current: &FewShots) -> FewShots {
        FewShots {
            speaker: if self.speaker.is_empty() {
                current.speaker.clone()
            } else {
                self.speaker
            },
            listener: if self.listener.is_empty() {
                current.listener.clone()
            } else {
                self.listener
            },
        }
    }

    /// Demonstrations taken from correct examples, at most `limit` each.
    pub fn from_examples(examples: &[Example], limit: usize) -> Self {
        let correct: Vec<&Example> = examples
            .iter()
            .filter(|e| e.correct && e.error.is_none() && !e.message.is_empty())
            .take(limit)
            .collect();
        Self {
            speaker: correct
                .iter()
                .map(|e| SpeakerShot {
                    scene: e.scene.clone(),
                    message: e.message.clone(),
                })
                .collect(),
            listener: correct
                .iter()
                .map(|e| ListenerShot {
                    scene: Some(e.scene.clone()),
                    message: e.message.clone(),
                    answer: e.prediction,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SceneObject;

    fn example(message: &str, correct: bool) -> Example {
        let scene = Scene::new(
            vec![
                SceneObject::new("red", "circle", "small"),
                SceneObject::new("blue", "square", "large"),
            ],
            0,
        )
        .unwrap();
        Example {
            scene,
            message: Message::new(message),
            prediction: if correct { 0 } else { 1 },
            correct,
            error: None,
        }
    }

    #[test]
    fn test_message_char_len_counts_chars() {
        assert_eq!(Message::new("é:x").char_len(), 3);
        assert!(Message::default().is_empty());
    }

    #[test]
    fn test_fewshots_from_correct_examples_only() {
        let examples = vec![example("a", true), example("b", false), example("c", true)];
        let shots = FewShots::from_examples(&examples, 5);
        assert_eq!(shots.speaker.len(), 2);
        assert_eq!(shots.listener[1].message.as_str(), "c");
        assert_eq!(shots.listener[0].answer, 0);
    }

    #[test]
    fn test_fewshots_limit() {
        let examples = vec![example("a", true), example("b", true), example("c", true)];
        assert_eq!(FewShots::from_examples(&examples, 2).speaker.len(), 2);
    }

    #[test]
    fn test_partial_bundle_keeps_other_side() {
        let current = FewShots::from_examples(&[example("a", true)], 1);
        let patch = FewShots {
            speaker: FewShots::from_examples(&[example("b", true)], 1).speaker,
            listener: Vec::new(),
        };
        let merged = patch.over(&current);
        assert_eq!(merged.speaker[0].message.as_str(), "b");
        assert_eq!(merged.listener, current.listener);

        assert_eq!(FewShots::default().over(&current), current);
    }

    #[test]
    fn test_listener_shot_without_scene() {
        let shot: ListenerShot = serde_json::from_str(r#"{"message":"c:r","answer":2}"#).unwrap();
        assert!(shot.scene.is_none());
        assert_eq!(shot.answer, 2);
    }
}
