//! Evolutionary control loop.
//!
//! Each round evaluates the current grammar on a fresh batch, checks the stop
//! transitions, asks the proposer for a patch and smoke-tests the candidate
//! on a subset of the same scenes. Only the loop reads or writes the current
//! grammar and the best-so-far bundle.

use std::sync::Arc;

use neuralese_core::{
    BestBundle, FewShots, Grammar, Metrics, Patch, RejectReason, RoundOutcome, RoundRecord,
    Scene, SkipReason, StopReason,
};
use neuralese_env::{EnvConfig, SceneSampler, StdRng};
use neuralese_evaluation::{score, Evaluation, EvaluationError, Evaluator, ScoreWeights};
use neuralese_oracle::{Oracle, Proposer};
use neuralese_storage::ArtifactStore;
use tracing::{debug, info, warn};

use crate::config::EvolutionConfig;
use crate::error::EvolutionError;
use crate::gate::{GateDecision, SmokeGate};
use crate::report::RunReport;

/// What the loop does after a round.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundStep {
    /// Run the next round
    Continue,
    /// Terminate
    Stop(StopReason),
}

/// Round-based grammar search.
pub struct EvolutionEngine<S: ArtifactStore> {
    oracle: Arc<dyn Oracle>,
    evaluator: Evaluator,
    store: S,
    sampler: SceneSampler,
    batch_size: usize,
    rng: StdRng,
    config: EvolutionConfig,
    weights: ScoreWeights,

    current: Grammar,
    fewshots: FewShots,
    best: Option<BestBundle>,
    history: Vec<RoundRecord>,
}

impl<S: ArtifactStore> EvolutionEngine<S> {
    /// Create an engine starting from the base grammar.
    pub fn new(oracle: Arc<dyn Oracle>, store: S, env: &EnvConfig) -> Self {
        Self {
            evaluator: Evaluator::new(oracle.clone()),
            oracle,
            store,
            sampler: env.sampler(),
            batch_size: env.batch_size,
            rng: env.rng(),
            config: EvolutionConfig::default(),
            weights: ScoreWeights::default(),
            current: Grammar::base(),
            fewshots: FewShots::default(),
            best: None,
            history: Vec::new(),
        }
    }

    /// Use custom loop settings.
    pub fn with_config(mut self, config: EvolutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use custom score weights.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Start from `grammar` instead of the base grammar.
    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.current = grammar;
        self
    }

    /// Start with these few-shots.
    pub fn with_fewshots(mut self, fewshots: FewShots) -> Self {
        self.fewshots = fewshots;
        self
    }

    /// The current accepted grammar.
    pub fn current(&self) -> &Grammar {
        &self.current
    }

    /// Few-shots in use.
    pub fn fewshots(&self) -> &FewShots {
        &self.fewshots
    }

    /// Best-so-far bundle.
    pub fn best(&self) -> Option<&BestBundle> {
        self.best.as_ref()
    }

    /// Rounds recorded so far.
    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    /// The artifact store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the engine, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Run rounds until a stop transition fires or the budget is spent.
    ///
    /// Only a sampler failure is an error; every other failure is recovered
    /// inside the round or surfaces as a [`StopReason`].
    pub async fn run(&mut self) -> Result<RunReport, EvolutionError> {
        info!("Starting evolution: {} rounds", self.config.rounds);

        let mut stop = StopReason::BudgetExhausted;
        for round in 0..self.config.rounds {
            if let RoundStep::Stop(reason) = self.run_round(round).await? {
                stop = reason;
                break;
            }
        }

        if let Err(e) = self.store.save_final(&self.current).await {
            warn!("Failed to save final grammar: {}", e);
        }
        info!("Evolution finished: {}", stop);

        Ok(RunReport::new(
            self.current.clone(),
            self.fewshots.clone(),
            self.best.clone(),
            self.history.clone(),
            stop,
        ))
    }

    /// Run one round.
    pub async fn run_round(&mut self, round: usize) -> Result<RoundStep, EvolutionError> {
        let scenes = self.sampler.batch(self.batch_size, &mut self.rng)?;
        info!("Round {}: evaluating on {} scenes", round, scenes.len());

        // Evaluating
        let eval = match self.evaluator.evaluate(&self.current, &scenes, &self.fewshots).await {
            Ok(eval) => eval,
            Err(e) => {
                let metrics = Metrics {
                    complexity: self.current.complexity(),
                    ..Default::default()
                };
                return Ok(self.stop_on_oracle(round, metrics, e).await);
            }
        };

        let robust = match self.holdout_accuracy().await {
            Ok(robust) => robust,
            Err(e) => return Ok(self.stop_on_oracle(round, eval.metrics, e).await),
        };
        let round_score = score(&eval.metrics, &self.weights, robust);
        info!("Round {}: {} score={:.3}", round, eval.metrics.summary(), round_score);

        self.update_best(round, round_score, &eval).await;
        if let Err(e) = self.store.save_grammar_snapshot(round, &self.current).await {
            warn!("Failed to save grammar snapshot for round {}: {}", round, e);
        }

        if let Some(reason) = self.config.stop_reason(&eval.metrics) {
            info!("Round {}: stopping ({})", round, reason);
            let outcome = RoundOutcome::Stopped(reason.clone());
            self.record(round, eval.metrics, round_score, None, None, outcome).await;
            return Ok(RoundStep::Stop(reason));
        }

        // Proposing
        let patch = match self.propose(&eval).await {
            Ok(patch) => patch,
            Err(Proposal::Skip(reason)) => {
                warn!("Round {}: skipping mutation: {:?}", round, reason);
                let outcome = RoundOutcome::Skipped(reason);
                self.record(round, eval.metrics, round_score, None, None, outcome).await;
                return Ok(RoundStep::Continue);
            }
            Err(Proposal::Stop(message)) => {
                let reason = StopReason::OracleUnavailable { message };
                let outcome = RoundOutcome::Stopped(reason.clone());
                self.record(round, eval.metrics, round_score, None, None, outcome).await;
                return Ok(RoundStep::Stop(reason));
            }
        };
        debug!("Round {}: patch ops {:?}", round, patch.ops());

        // Candidate smoke test
        let candidate = match patch.apply(&self.current) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Round {}: patch rejected: {}", round, e);
                let outcome = RoundOutcome::Rejected(RejectReason::InvalidEdit {
                    message: e.to_string(),
                });
                self.record(round, eval.metrics, round_score, Some(patch), None, outcome).await;
                return Ok(RoundStep::Continue);
            }
        };

        let patch_fewshots = patch.fewshots();
        if candidate == self.current && patch_fewshots.is_empty() {
            let outcome = RoundOutcome::Skipped(SkipReason::NoChange);
            self.record(round, eval.metrics, round_score, Some(patch), None, outcome).await;
            return Ok(RoundStep::Continue);
        }

        let candidate_fewshots = patch_fewshots.over(&self.fewshots);
        let smoke_scenes: &[Scene] = &scenes[..self.config.smoke_size.min(scenes.len())];
        let smoke = match self
            .evaluator
            .evaluate(&candidate, smoke_scenes, &candidate_fewshots)
            .await
        {
            Ok(smoke) => smoke.metrics,
            Err(e) => return Ok(self.stop_on_oracle(round, eval.metrics, e).await),
        };

        // Accept/reject gate
        let decision = SmokeGate::new(self.config.smoke).check(&smoke);
        let outcome = match &decision {
            GateDecision::Accept => {
                info!("Round {}: accepted ({})", round, smoke.summary());
                RoundOutcome::Accepted
            }
            GateDecision::Reject(reason) => {
                info!("Round {}: rejected ({})", round, reason);
                RoundOutcome::Rejected(reason.clone())
            }
        };
        self.record(round, eval.metrics, round_score, Some(patch), Some(smoke), outcome)
            .await;
        if decision == GateDecision::Accept {
            self.current = candidate;
            self.fewshots = candidate_fewshots;
        }
        Ok(RoundStep::Continue)
    }

    async fn holdout_accuracy(&mut self) -> Result<Option<f64>, EvaluationError> {
        if self.config.holdout_size == 0 {
            return Ok(None);
        }
        let scenes = match self.sampler.batch(self.config.holdout_size, &mut self.rng) {
            Ok(scenes) => scenes,
            Err(e) => {
                warn!("Holdout sampling failed, skipping robustness term: {}", e);
                return Ok(None);
            }
        };
        let eval = self
            .evaluator
            .evaluate(&self.current, &scenes, &self.fewshots)
            .await?;
        Ok(Some(eval.metrics.accuracy))
    }

    async fn propose(&self, eval: &Evaluation) -> Result<Patch, Proposal> {
        let examples = eval.sample(self.config.example_sample);
        let text = match self.oracle.propose(&self.current, &eval.metrics, examples).await {
            Ok(text) => text,
            Err(e) if e.is_hard() => return Err(Proposal::Stop(e.to_string())),
            Err(e) if self.config.fallback_patch => {
                warn!("Proposer failed ({}), using fallback patch", e);
                return Ok(Patch::fallback());
            }
            Err(e) => {
                return Err(Proposal::Skip(SkipReason::ProposerFailed {
                    message: e.to_string(),
                }))
            }
        };
        Patch::from_json(&text).map_err(|e| {
            Proposal::Skip(SkipReason::InvalidPatch {
                message: e.to_string(),
            })
        })
    }

    async fn update_best(&mut self, round: usize, round_score: f64, eval: &Evaluation) {
        if self.best.as_ref().is_some_and(|b| round_score <= b.score) {
            return;
        }
        let mut fewshots = FewShots::from_examples(&eval.examples, self.config.best_fewshots);
        if fewshots.is_empty() {
            fewshots = self.fewshots.clone();
        }
        let best = BestBundle {
            grammar: self.current.clone(),
            fewshots,
            score: round_score,
            round,
            metrics: eval.metrics.clone(),
        };
        info!("Round {}: new best score {:.3}", round, round_score);
        if let Err(e) = self.store.save_best(&best).await {
            warn!("Failed to save best bundle: {}", e);
        }
        self.best = Some(best);
    }

    async fn stop_on_oracle(&mut self, round: usize, metrics: Metrics, err: EvaluationError) -> RoundStep {
        warn!("Round {}: {}", round, err);
        let round_score = score(&metrics, &self.weights, None);
        let reason = StopReason::OracleUnavailable {
            message: err.to_string(),
        };
        self.record(round, metrics, round_score, None, None, RoundOutcome::Stopped(reason.clone()))
            .await;
        RoundStep::Stop(reason)
    }

    async fn record(
        &mut self,
        round: usize,
        metrics: Metrics,
        score: f64,
        patch: Option<Patch>,
        smoke: Option<Metrics>,
        outcome: RoundOutcome,
    ) {
        let record = RoundRecord {
            round,
            grammar: self.current.clone(),
            metrics,
            score,
            patch,
            smoke,
            outcome,
            recorded_at: chrono::Utc::now(),
        };
        if let Err(e) = self.store.record_round(&record).await {
            warn!("Failed to record round {}: {}", round, e);
        }
        self.history.push(record);
    }
}

/// Why no patch comes out of the proposing state.
enum Proposal {
    Skip(SkipReason),
    Stop(String),
}
