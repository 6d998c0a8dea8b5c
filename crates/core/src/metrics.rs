//! Evaluation metrics for one (grammar, scene batch) pair.

use neuralese_grammar::GrammarComplexity;
use serde::{Deserialize, Serialize};

/// Metrics of a single evaluation. Never merged across rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Fraction of scenes where the listener hit the target
    pub accuracy: f64,
    /// Mean message length in characters, failed scenes counting as 0
    pub avg_msg_chars: f64,
    /// Fraction of scenes whose message is not unique in the batch
    pub collision_rate: f64,
    /// Fraction of scenes where an oracle call failed
    pub parse_fail_rate: f64,
    /// Structural size of the grammar
    pub complexity: GrammarComplexity,
    /// Scenes evaluated
    pub n_scenes: usize,
    /// Correct predictions
    pub n_correct: usize,
    /// Failed scenes
    pub n_parse_failures: usize,
}

impl Metrics {
    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "acc={:.3} ({}/{}) len={:.1} coll={:.3} fail={:.3} rules={} rhs={:.2}",
            self.accuracy,
            self.n_correct,
            self.n_scenes,
            self.avg_msg_chars,
            self.collision_rate,
            self.parse_fail_rate,
            self.complexity.rule_count,
            self.complexity.mean_rhs_symbols,
        )
    }
}
