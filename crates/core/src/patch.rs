//! Patches - proposed mutation sequences with optional few-shots.

use neuralese_grammar::{apply_all, Grammar, Mutation, MutationError, ALLOWED_OPS};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::example::{FewShots, ListenerShot, SpeakerShot};

/// Reasons a patch is refused.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Not valid JSON, or fields of the wrong shape.
    #[error("invalid patch JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No `mutations` array.
    #[error("patch missing 'mutations' list")]
    MissingMutations,

    /// A mutation carries an operation outside the allowed set.
    #[error("invalid op: {0}")]
    UnknownOperation(String),

    /// An edit failed or left the grammar malformed.
    #[error("patch rejected: {0}")]
    Rejected(#[from] MutationError),
}

/// Ordered mutations plus few-shot bundles, applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Edits, applied left to right
    pub mutations: Vec<Mutation>,
    /// Speaker demonstrations for future calls
    #[serde(default)]
    pub speaker_fewshot: Vec<SpeakerShot>,
    /// Listener demonstrations for future calls
    #[serde(default)]
    pub listener_fewshot: Vec<ListenerShot>,
}

impl Patch {
    /// Patch with the given mutations and no few-shots.
    pub fn new(mutations: Vec<Mutation>) -> Self {
        Self {
            mutations,
            ..Default::default()
        }
    }

    /// Parse and validate proposer output.
    ///
    /// A surrounding Markdown code fence is tolerated. Every mutation's `op`
    /// must be in [`ALLOWED_OPS`].
    pub fn from_json(text: &str) -> Result<Self, PatchError> {
        let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))?;
        let mutations = value
            .get("mutations")
            .and_then(|m| m.as_array())
            .ok_or(PatchError::MissingMutations)?;
        for m in mutations {
            let op = m.get("op").and_then(|o| o.as_str()).unwrap_or("");
            if !ALLOWED_OPS.contains(&op) {
                warn!("proposer returned unknown op '{}'", op);
                return Err(PatchError::UnknownOperation(op.to_string()));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The trivial rename patch used when the proposer fails.
    pub fn fallback() -> Self {
        let rename = |from: &str, to: &str| Mutation::RenameTerminal {
            from: from.into(),
            to: to.into(),
        };
        Self::new(vec![
            rename("color", "c"),
            rename("shape", "s"),
            rename("size", "z"),
        ])
    }

    /// Apply every mutation, or none.
    pub fn apply(&self, grammar: &Grammar) -> Result<Grammar, PatchError> {
        Ok(apply_all(grammar, &self.mutations)?)
    }

    /// The few-shots carried by this patch.
    pub fn fewshots(&self) -> FewShots {
        FewShots {
            speaker: self.speaker_fewshot.clone(),
            listener: self.listener_fewshot.clone(),
        }
    }

    /// Operation tags, in order.
    pub fn ops(&self) -> Vec<&'static str> {
        self.mutations.iter().map(Mutation::op).collect()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop an optional language tag on the opening fence
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_patch() {
        let patch = Patch::from_json(
            r#"{"mutations":[{"op":"rename","from":"color","to":"c"},{"op":"remove_separators"}]}"#,
        )
        .unwrap();
        assert_eq!(patch.ops(), vec!["rename_terminal", "remove_separators"]);
        assert!(patch.fewshots().is_empty());
    }

    #[test]
    fn test_unknown_op_rejected() {
        let err = Patch::from_json(r#"{"mutations":[{"op":"bogus_op"}]}"#).unwrap_err();
        assert!(matches!(err, PatchError::UnknownOperation(op) if op == "bogus_op"));
    }

    #[test]
    fn test_missing_mutations_rejected() {
        assert!(matches!(
            Patch::from_json(r#"{"speaker_fewshot":[]}"#),
            Err(PatchError::MissingMutations)
        ));
        assert!(matches!(Patch::from_json("not json"), Err(PatchError::Json(_))));
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let text = "```json\n{\"mutations\": []}\n```";
        assert_eq!(Patch::from_json(text).unwrap(), Patch::default());
    }

    #[test]
    fn test_fewshots_parsed() {
        let text = r#"{
            "mutations": [],
            "speaker_fewshot": [{"scene": {"objects": [{"color":"red","shape":"circle","size":"small"}], "target_idx": 0}, "message": "c:red"}],
            "listener_fewshot": [{"message": "c:red", "answer": 0}]
        }"#;
        let patch = Patch::from_json(text).unwrap();
        assert_eq!(patch.speaker_fewshot.len(), 1);
        assert_eq!(patch.listener_fewshot[0].answer, 0);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let g = Grammar::base();
        assert_eq!(Patch::default().apply(&g).unwrap(), g);
    }

    #[test]
    fn test_fallback_patch_shortens_slots() {
        let g = Patch::fallback().apply(&Grammar::base()).unwrap();
        assert_eq!(g.rule("slot").unwrap().to_string(), r#"slot: "c" | "s" | "z""#);
    }
}
