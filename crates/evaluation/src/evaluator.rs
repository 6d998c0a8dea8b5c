//! Evaluation protocol.

use std::sync::Arc;

use neuralese_core::{Example, FewShots, Grammar, Message, Metrics, Scene};
use neuralese_oracle::{Listener, Oracle, OracleError, Speaker};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{avg_len, collision_rate};

/// Evaluation failures. Only hard oracle failures escape a batch.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// The oracle reported a failure that makes further calls pointless.
    #[error("batch aborted at scene {scene}: {source}")]
    OracleUnavailable {
        /// Index of the scene being played
        scene: usize,
        /// Underlying failure
        #[source]
        source: OracleError,
    },
}

/// Metrics of one batch plus every per-scene example, in scene order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Aggregate metrics
    pub metrics: Metrics,
    /// One example per scene
    pub examples: Vec<Example>,
}

impl Evaluation {
    /// The first `n` examples.
    pub fn sample(&self, n: usize) -> &[Example] {
        &self.examples[..n.min(self.examples.len())]
    }
}

/// Plays scenes through the speaker and listener.
#[derive(Clone)]
pub struct Evaluator {
    oracle: Arc<dyn Oracle>,
}

impl Evaluator {
    /// Create an evaluator over `oracle`.
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Evaluate `grammar` on `scenes`.
    ///
    /// Scenes are played one at a time. A soft oracle failure costs exactly
    /// that scene: empty message, prediction 0, incorrect. A hard failure
    /// aborts the batch.
    pub async fn evaluate(
        &self,
        grammar: &Grammar,
        scenes: &[Scene],
        fewshots: &FewShots,
    ) -> Result<Evaluation, EvaluationError> {
        let mut examples = Vec::with_capacity(scenes.len());

        for (i, scene) in scenes.iter().enumerate() {
            let example = match self.play(grammar, scene, fewshots).await {
                Ok((message, prediction)) => {
                    let correct = prediction == scene.target_idx();
                    debug!("Scene {}: {:?} -> {} (correct: {})", i, message.as_str(), prediction, correct);
                    Example {
                        scene: scene.clone(),
                        message,
                        prediction,
                        correct,
                        error: None,
                    }
                }
                Err(err) if err.is_hard() => {
                    return Err(EvaluationError::OracleUnavailable { scene: i, source: err });
                }
                Err(err) => {
                    warn!("Scene {} counted as parse failure: {}", i, err);
                    Example {
                        scene: scene.clone(),
                        message: Message::default(),
                        prediction: 0,
                        correct: false,
                        error: Some(err.to_string()),
                    }
                }
            };
            examples.push(example);
        }

        let metrics = aggregate(grammar, &examples);
        info!("Evaluated {} scenes: {}", scenes.len(), metrics.summary());
        Ok(Evaluation { metrics, examples })
    }

    async fn play(
        &self,
        grammar: &Grammar,
        scene: &Scene,
        fewshots: &FewShots,
    ) -> Result<(Message, usize), OracleError> {
        let message = self.oracle.speak(grammar, scene, &fewshots.speaker).await?;
        let prediction = self
            .oracle
            .listen(grammar, scene, &message, &fewshots.listener)
            .await?;
        if prediction >= scene.len() {
            return Err(OracleError::Malformed(format!(
                "listener index {} out of range 0..{}",
                prediction,
                scene.len()
            )));
        }
        Ok((message, prediction))
    }
}

fn aggregate(grammar: &Grammar, examples: &[Example]) -> Metrics {
    let n = examples.len();
    let denom = n.max(1) as f64;
    let n_correct = examples.iter().filter(|e| e.correct).count();
    let n_parse_failures = examples.iter().filter(|e| e.error.is_some()).count();
    let messages: Vec<Message> = examples.iter().map(|e| e.message.clone()).collect();

    Metrics {
        accuracy: n_correct as f64 / denom,
        avg_msg_chars: avg_len(&messages),
        collision_rate: collision_rate(&messages),
        parse_fail_rate: n_parse_failures as f64 / denom,
        complexity: grammar.complexity(),
        n_scenes: n,
        n_correct,
        n_parse_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuralese_core::SceneObject;
    use neuralese_oracle::fakes::FakeOracle;

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
    async fn test_perfect_batch() {
        let evaluator = Evaluator::new(Arc::new(FakeOracle::new()));
        let scenes = vec![scene(0), scene(1)];
        let eval = evaluator
            .evaluate(&Grammar::base(), &scenes, &FewShots::default())
            .await
            .unwrap();
        assert_eq!(eval.metrics.accuracy, 1.0);
        assert_eq!(eval.metrics.parse_fail_rate, 0.0);
        assert_eq!(eval.metrics.collision_rate, 0.0);
        assert_eq!(eval.metrics.complexity.rule_count, 5);
        assert_eq!(eval.examples.len(), 2);
        assert_eq!(eval.sample(5).len(), 2);
    }

    #[tokio::test]
    async fn test_soft_failure_costs_one_scene() {
        let oracle = FakeOracle::new().with_speaker(|_, scene| {
            if scene.target_idx() == 1 {
                Err(OracleError::Generation("no legal text".into()))
            } else {
                Ok(Message::new("color:red;shape:circle;size:small"))
            }
        });
        let evaluator = Evaluator::new(Arc::new(oracle));
        let scenes = vec![scene(0), scene(1), scene(0), scene(1)];
        let eval = evaluator
            .evaluate(&Grammar::base(), &scenes, &FewShots::default())
            .await
            .unwrap();
        let m = &eval.metrics;
        assert_eq!(m.accuracy, 0.5);
        assert_eq!(m.parse_fail_rate, 0.5);
        assert!(m.accuracy <= 1.0 - m.parse_fail_rate);
        // two 33-char messages, two empty ones
        assert_eq!(m.avg_msg_chars, 16.5);
        // two identical messages plus two identical empty strings
        assert_eq!(m.collision_rate, 0.5);
        assert_eq!(eval.examples[1].prediction, 0);
        assert!(eval.examples[1].message.is_empty());
        assert!(eval.examples[1].error.is_some());
    }

    #[tokio::test]
    async fn test_out_of_range_listener_is_parse_failure() {
        let oracle = FakeOracle::new().with_listener(|_, _| Ok(9));
        let eval = Evaluator::new(Arc::new(oracle))
            .evaluate(&Grammar::base(), &[scene(0)], &FewShots::default())
            .await
            .unwrap();
        assert_eq!(eval.metrics.n_parse_failures, 1);
        assert_eq!(eval.metrics.accuracy, 0.0);
    }

    #[tokio::test]
    async fn test_hard_failure_aborts_batch() {
        let oracle = FakeOracle::new()
            .with_speaker(|_, _| Err(OracleError::Unavailable("no key".into())));
        let result = Evaluator::new(Arc::new(oracle))
            .evaluate(&Grammar::base(), &[scene(0), scene(1)], &FewShots::default())
            .await;
        assert!(matches!(
            result,
            Err(EvaluationError::OracleUnavailable { scene: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let eval = Evaluator::new(Arc::new(FakeOracle::new()))
            .evaluate(&Grammar::base(), &[], &FewShots::default())
            .await
            .unwrap();
        assert_eq!(eval.metrics.accuracy, 0.0);
        assert_eq!(eval.metrics.n_scenes, 0);
    }
}
