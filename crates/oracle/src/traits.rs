//! Capability traits.

use async_trait::async_trait;
use neuralese_core::{Example, Grammar, ListenerShot, Message, Metrics, Scene, SpeakerShot};

use crate::error::OracleError;

/// Produces a grammar-legal message identifying a scene's target.
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Emit a message for `scene`'s target, legal under `grammar`.
    async fn speak(
        &self,
        grammar: &Grammar,
        scene: &Scene,
        fewshots: &[SpeakerShot],
    ) -> Result<Message, OracleError>;
}

/// Recovers the target index from a message.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Guess which object of `scene` the message denotes, in `[0, scene.len())`.
    async fn listen(
        &self,
        grammar: &Grammar,
        scene: &Scene,
        message: &Message,
        fewshots: &[ListenerShot],
    ) -> Result<usize, OracleError>;
}

/// Suggests grammar patches.
#[async_trait]
pub trait Proposer: Send + Sync {
    /// Return raw patch JSON for the current grammar, given its metrics and
    /// a sample of examples. Validation is the caller's job.
    async fn propose(
        &self,
        grammar: &Grammar,
        metrics: &Metrics,
        examples: &[Example],
    ) -> Result<String, OracleError>;
}

/// All three capabilities behind one object.
pub trait Oracle: Speaker + Listener + Proposer {}

impl<T: Speaker + Listener + Proposer> Oracle for T {}
