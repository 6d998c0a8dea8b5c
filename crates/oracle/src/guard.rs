//! Timeout and retry controls around oracle calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use neuralese_core::{Example, Grammar, ListenerShot, Message, Metrics, Scene, SpeakerShot};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FailureClass, OracleError};
use crate::traits::{Listener, Oracle, Proposer, Speaker};

/// Per-call limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Wall-clock limit for a single attempt (milliseconds)
    pub timeout_ms: u64,
    /// Retries after the first attempt, for transient failures only
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt - 1)))
    }
}

/// Run `call` under the policy's timeout, retrying transient failures with
/// exponential backoff. Soft and hard failures return immediately.
pub async fn guarded<T, F, Fut>(policy: &RetryPolicy, label: &str, call: F) -> Result<T, OracleError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let max_attempts = policy.max_retries + 1;
    let limit = Duration::from_millis(policy.timeout_ms);
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(limit, call()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(OracleError::Timeout {
                elapsed_ms: policy.timeout_ms,
            }),
        };

        match result {
            Err(err) if err.class() == FailureClass::Transient && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{} call failed (attempt {}/{}): {}; retrying in {:?}",
                    label, attempt, max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Wraps an oracle so every call is bounded by a [`RetryPolicy`].
pub struct GuardedOracle<O> {
    inner: O,
    policy: RetryPolicy,
}

impl<O: Oracle> GuardedOracle<O> {
    /// Guard `inner` with `policy`.
    pub fn new(inner: O, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<O: Oracle> Speaker for GuardedOracle<O> {
    async fn speak(
        &self,
        grammar: &Grammar,
        scene: &Scene,
        fewshots: &[SpeakerShot],
    ) -> Result<Message, OracleError> {
        guarded(&self.policy, "speaker", move || self.inner.speak(grammar, scene, fewshots)).await
    }
}

#[async_trait]
impl<O: Oracle> Listener for GuardedOracle<O> {
    async fn listen(
        &self,
        grammar: &Grammar,
        scene: &Scene,
        message: &Message,
        fewshots: &[ListenerShot],
    ) -> Result<usize, OracleError> {
        guarded(&self.policy, "listener", move || {
            self.inner.listen(grammar, scene, message, fewshots)
        })
        .await
    }
}

#[async_trait]
impl<O: Oracle> Proposer for GuardedOracle<O> {
    async fn propose(
        &self,
        grammar: &Grammar,
        metrics: &Metrics,
        examples: &[Example],
    ) -> Result<String, OracleError> {
        guarded(&self.policy, "proposer", move || {
            self.inner.propose(grammar, metrics, examples)
        })
        .await
    }
}
