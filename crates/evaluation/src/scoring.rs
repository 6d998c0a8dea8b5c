//! Composite scoring.

use neuralese_core::Metrics;
use serde::{Deserialize, Serialize};

/// Linear penalty weights. Missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Per average message character
    pub len_per_char: f64,
    /// Per grammar rule
    pub complexity_per_prod: f64,
    /// Per mean right-hand-side symbol
    pub complexity_per_rhs_symbol: f64,
    /// Per unit of collision rate
    pub collisions: f64,
    /// Scale of the held-out accuracy gap
    pub robust_factor: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            len_per_char: 0.02,
            complexity_per_prod: 0.5,
            complexity_per_rhs_symbol: 0.1,
            collisions: 5.0,
            robust_factor: 0.5,
        }
    }
}

/// Rank a grammar version. `robust` is held-out accuracy, when measured.
pub fn score(metrics: &Metrics, weights: &ScoreWeights, robust: Option<f64>) -> f64 {
    let mut s = metrics.accuracy;
    s -= weights.len_per_char * metrics.avg_msg_chars;
    s -= weights.complexity_per_prod * metrics.complexity.rule_count as f64;
    s -= weights.complexity_per_rhs_symbol * metrics.complexity.mean_rhs_symbols;
    s -= weights.collisions * metrics.collision_rate;
    if let Some(robust) = robust {
        s += weights.robust_factor * (robust - metrics.accuracy);
    }
    s
}
