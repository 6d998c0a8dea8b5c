//! Prompt rendering for the three oracle roles.

use neuralese_core::{Example, Grammar, ListenerShot, Metrics, Scene, SpeakerShot};
use neuralese_grammar::ALLOWED_OPS;
use serde::{Deserialize, Serialize};

const SPEAKER_PROMPT: &str = "You are the SPEAKER. Given a target object and distractors, emit the \
SHORTEST legal message under the attached grammar that lets a competent LISTENER uniquely identify \
the target. Output only the string that matches the grammar's start rule.\n\n\
Use only terminals allowed by the grammar. Do not emit English words or slot names unless present \
in the grammar.";

const LISTENER_PROMPT: &str = "You are the LISTENER. Given a legal message (per the attached grammar) \
and the list of objects, determine which object the SPEAKER intended. Output only the zero-based \
index of the target.";

/// Chat turn author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions
    System,
    /// Request
    User,
    /// Demonstrated answer
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: Role,
    /// Text
    pub content: String,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

fn object_lines(scene: &Scene) -> String {
    scene
        .objects()
        .iter()
        .enumerate()
        .map(|(i, o)| format!("{}: color={}, shape={}, size={}", i, o.color, o.shape, o.size))
        .collect::<Vec<_>>()
        .join("\n")
}

fn speaker_request(scene: &Scene) -> String {
    format!(
        "Objects:\n{}\nTarget index: {}\nOutput only the message.",
        object_lines(scene),
        scene.target_idx()
    )
}

/// Speaker conversation: instructions, few-shots as user/assistant pairs, request.
pub(crate) fn speaker_messages(scene: &Scene, fewshots: &[SpeakerShot]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new(Role::System, SPEAKER_PROMPT)];
    for shot in fewshots {
        messages.push(ChatMessage::new(Role::User, speaker_request(&shot.scene)));
        messages.push(ChatMessage::new(Role::Assistant, shot.message.as_str()));
    }
    messages.push(ChatMessage::new(Role::User, speaker_request(scene)));
    messages
}

/// Listener conversation. The target index is never shown.
pub(crate) fn listener_messages(
    scene: &Scene,
    message: &str,
    fewshots: &[ListenerShot],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new(Role::System, LISTENER_PROMPT)];
    for shot in fewshots {
        let request = match &shot.scene {
            Some(s) => format!(
                "Objects:\n{}\nMessage: {}\nOutput only the index.",
                object_lines(s),
                shot.message
            ),
            None => format!("Message: {}\nOutput only the index.", shot.message),
        };
        messages.push(ChatMessage::new(Role::User, request));
        messages.push(ChatMessage::new(Role::Assistant, shot.answer.to_string()));
    }
    messages.push(ChatMessage::new(
        Role::User,
        format!(
            "Objects:\n{}\nMessage: {}\nOutput only the zero-based index.",
            object_lines(scene),
            message
        ),
    ));
    messages
}

/// Proposer conversation: allowed operations, grammar, metrics, examples.
pub(crate) fn proposer_messages(
    grammar: &Grammar,
    metrics: &Metrics,
    examples: &[Example],
) -> Vec<ChatMessage> {
    let system = format!(
        "You are the PROPOSER.\n\
         You will receive the current grammar, evaluation metrics, and a few examples.\n\
         Your task: suggest a JSON patch with grammar mutations that shortens messages \
         without losing accuracy.\n\n\
         Allowed operations:\n{}\n\
         Output ONLY valid JSON in this format:\n\
         {{ \"mutations\": [ {{ \"op\": \"...\", ... }} ], \"speaker_fewshot\": [], \"listener_fewshot\": [] }}\n\
         Do not add any text before or after the JSON.",
        ALLOWED_OPS.join(", ")
    );

    let examples = examples
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let target = e.scene.target();
            format!(
                "Scene {}: {} {} {}\nMessage: {}\nPrediction: {}, Correct: {}, Success: {}",
                i,
                target.color,
                target.shape,
                target.size,
                e.message,
                e.prediction,
                e.scene.target_idx(),
                e.correct
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");
    let metrics_json = serde_json::to_string_pretty(metrics).unwrap_or_else(|_| metrics.summary());

    vec![
        ChatMessage::new(Role::System, system),
        ChatMessage::new(
            Role::User,
            format!(
                "=== Current Grammar ===\n{}\n\n=== Metrics ===\n{}\n\n=== Examples ===\n{}",
                grammar, metrics_json, examples
            ),
        ),
    ]
}

/// Grammar whose only legal outputs are the indices `0..k`.
pub fn index_grammar(k: usize) -> String {
    let choices = (0..k.max(1))
        .map(|i| format!("\"{}\"", i))
        .collect::<Vec<_>>()
        .join(" | ");
    format!("start: {}\n", choices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuralese_core::{Message, SceneObject};

    fn scene() -> Scene {
        Scene::new(
            vec![
                SceneObject::new("red", "circle", "small"),
                SceneObject::new("blue", "square", "large"),
            ],
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_speaker_fewshots_alternate_turns() {
        let shots = vec![SpeakerShot {
            scene: scene(),
            message: Message::new("c:blue"),
        }];
        let messages = speaker_messages(&scene(), &shots);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[2].content, "c:blue");
        assert!(messages[3].content.contains("1: color=blue, shape=square, size=large"));
        assert!(messages[3].content.contains("Target index: 1"));
    }

    #[test]
    fn test_listener_prompt_hides_target() {
        let messages = listener_messages(&scene(), "c:blue", &[]);
        assert_eq!(messages.len(), 2);
        assert!(!messages[1].content.contains("Target index"));
        assert!(messages[1].content.contains("Message: c:blue"));
    }

    #[test]
    fn test_proposer_prompt_lists_ops() {
        let messages = proposer_messages(&Grammar::base(), &Metrics::default(), &[]);
        for op in ALLOWED_OPS {
            assert!(messages[0].content.contains(op));
        }
        assert!(messages[1].content.contains("start: msg"));
    }

    #[test]
    fn test_index_grammar() {
        assert_eq!(index_grammar(3), "start: \"0\" | \"1\" | \"2\"\n");
        assert!(Grammar::parse(&index_grammar(12)).is_ok());
    }
}
