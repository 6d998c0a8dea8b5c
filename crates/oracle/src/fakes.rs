//! In-memory oracle fakes (testing only).
//!
//! [`FakeOracle`] plays a competent speaker and listener without any network
//! access and replays queued proposer responses. Behaviour can be swapped per
//! role with closures so tests can model grammar-dependent failures.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use neuralese_core::{Example, Grammar, ListenerShot, Message, Metrics, Scene, SpeakerShot};
use tokio::sync::Mutex;

use crate::error::OracleError;
use crate::traits::{Listener, Proposer, Speaker};

type SpeakFn = dyn Fn(&Grammar, &Scene) -> Result<Message, OracleError> + Send + Sync;
type ListenFn = dyn Fn(&Scene, &Message) -> Result<usize, OracleError> + Send + Sync;

/// Patch returned once the proposal queue is drained.
pub const EMPTY_PATCH: &str = r#"{"mutations": []}"#;

/// Spells out every attribute of the target: `color:red;shape:circle;size:small`.
pub fn describe_target(_grammar: &Grammar, scene: &Scene) -> Result<Message, OracleError> {
    let t = scene.target();
    Ok(Message::new(format!(
        "color:{};shape:{};size:{}",
        t.color, t.shape, t.size
    )))
}

/// Picks the first object whose three attribute values all occur in the message.
pub fn match_attributes(scene: &Scene, message: &Message) -> Result<usize, OracleError> {
    let text = message.as_str();
    scene
        .objects()
        .iter()
        .position(|o| {
            [&o.color, &o.shape, &o.size]
                .iter()
                .all(|v| text.split(|c: char| !c.is_alphanumeric()).any(|tok| tok == v.as_str()))
        })
        .ok_or_else(|| OracleError::Malformed(format!("no object matches {:?}", text)))
}

/// Call counters per role.
#[derive(Debug, Default)]
pub struct CallCounts {
    speaker: AtomicUsize,
    listener: AtomicUsize,
    proposer: AtomicUsize,
}

impl CallCounts {
    /// Speaker calls so far.
    pub fn speaker(&self) -> usize {
        self.speaker.load(Ordering::SeqCst)
    }

    /// Listener calls so far.
    pub fn listener(&self) -> usize {
        self.listener.load(Ordering::SeqCst)
    }

    /// Proposer calls so far.
    pub fn proposer(&self) -> usize {
        self.proposer.load(Ordering::SeqCst)
    }
}

/// Scriptable in-memory oracle.
pub struct FakeOracle {
    speak: Box<SpeakFn>,
    listen: Box<ListenFn>,
    proposals: Mutex<VecDeque<Result<String, OracleError>>>,
    calls: CallCounts,
}

impl FakeOracle {
    /// Competent speaker and listener, no queued proposals.
    pub fn new() -> Self {
        Self {
            speak: Box::new(describe_target),
            listen: Box::new(match_attributes),
            proposals: Mutex::new(VecDeque::new()),
            calls: CallCounts::default(),
        }
    }

    /// Replace the speaker behaviour.
    pub fn with_speaker(
        mut self,
        f: impl Fn(&Grammar, &Scene) -> Result<Message, OracleError> + Send + Sync + 'static,
    ) -> Self {
        self.speak = Box::new(f);
        self
    }

    /// Replace the listener behaviour.
    pub fn with_listener(
        mut self,
        f: impl Fn(&Scene, &Message) -> Result<usize, OracleError> + Send + Sync + 'static,
    ) -> Self {
        self.listen = Box::new(f);
        self
    }

    /// Queue proposer responses, returned in order.
    pub fn with_proposals(
        self,
        proposals: impl IntoIterator<Item = Result<String, OracleError>>,
    ) -> Self {
        let queue = proposals.into_iter().collect();
        Self {
            proposals: Mutex::new(queue),
            ..self
        }
    }

    /// Call counters.
    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }
}

impl Default for FakeOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Speaker for FakeOracle {
    async fn speak(
        &self,
        grammar: &Grammar,
        scene: &Scene,
        _fewshots: &[SpeakerShot],
    ) -> Result<Message, OracleError> {
        self.calls.speaker.fetch_add(1, Ordering::SeqCst);
        (self.speak)(grammar, scene)
    }
}

#[async_trait]
impl Listener for FakeOracle {
    async fn listen(
        &self,
        _grammar: &Grammar,
        scene: &Scene,
        message: &Message,
        _fewshots: &[ListenerShot],
    ) -> Result<usize, OracleError> {
        self.calls.listener.fetch_add(1, Ordering::SeqCst);
        (self.listen)(scene, message)
    }
}

#[async_trait]
impl Proposer for FakeOracle {
    async fn propose(
        &self,
        _grammar: &Grammar,
        _metrics: &Metrics,
        _examples: &[Example],
    ) -> Result<String, OracleError> {
        self.calls.proposer.fetch_add(1, Ordering::SeqCst);
        self.proposals
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(EMPTY_PATCH.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuralese_core::SceneObject;

    fn scene(target_idx: usize) -> Scene {
        Scene::new(
            vec![
                SceneObject::new("red", "circle", "small"),
                SceneObject::new("blue", "square", "large"),
            ],
            target_idx,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_base_grammar_scenario() {
        let oracle = FakeOracle::new();
        let g = Grammar::base();
        let message = oracle.speak(&g, &scene(0), &[]).await.unwrap();
        assert_eq!(message.as_str(), "color:red;shape:circle;size:small");
        assert_eq!(oracle.listen(&g, &scene(0), &message, &[]).await.unwrap(), 0);
    }

    #[test]
    fn test_attribute_matching_is_token_exact() {
        let s = scene(1);
        let message = describe_target(&Grammar::base(), &s).unwrap();
        assert_eq!(match_attributes(&s, &message).unwrap(), 1);
        assert!(match_attributes(&s, &Message::new("reddish")).is_err());
    }

    #[tokio::test]
    async fn test_proposals_replayed_then_empty() {
        let oracle = FakeOracle::new().with_proposals(vec![
            Ok("first".to_string()),
            Err(OracleError::Malformed("junk".into())),
        ]);
        let g = Grammar::base();
        let m = Metrics::default();
        assert_eq!(oracle.propose(&g, &m, &[]).await.unwrap(), "first");
        assert!(oracle.propose(&g, &m, &[]).await.is_err());
        assert_eq!(oracle.propose(&g, &m, &[]).await.unwrap(), EMPTY_PATCH);
        assert_eq!(oracle.calls().proposer(), 3);
    }
}
