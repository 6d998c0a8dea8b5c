//! Control-loop settings.

use neuralese_core::{Metrics, StopReason};
use serde::{Deserialize, Serialize};

/// Round budget, stopping thresholds, smoke-test guards and sampling sizes.
///
/// Values are checked by type only; a nonsensical threshold simply makes the
/// loop stop early or never.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Maximum rounds
    pub rounds: usize,
    /// Stop successfully at or above this accuracy...
    pub stop_accuracy: f64,
    /// ...when average message length is at or below this
    pub stop_avg_len: f64,
    /// Stop when accuracy falls below this
    pub accuracy_floor: f64,
    /// Accept/reject thresholds for candidates
    pub smoke: SmokeGuards,
    /// Scenes reused for the smoke test (capped at the batch size)
    pub smoke_size: usize,
    /// Examples passed to the proposer
    pub example_sample: usize,
    /// Held-out scenes per round for the robustness term; 0 disables it
    pub holdout_size: usize,
    /// Substitute the trivial rename patch when the proposer call fails
    pub fallback_patch: bool,
    /// Few-shots derived for the best bundle
    pub best_fewshots: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            rounds: 10,
            stop_accuracy: 0.97,
            stop_avg_len: 8.0,
            accuracy_floor: 0.5,
            smoke: SmokeGuards::default(),
            smoke_size: 20,
            example_sample: 5,
            holdout_size: 0,
            fallback_patch: false,
            best_fewshots: 3,
        }
    }
}

impl EvolutionConfig {
    /// Round-level stop transition for `metrics`, if any fires.
    pub fn stop_reason(&self, metrics: &Metrics) -> Option<StopReason> {
        if metrics.accuracy >= self.stop_accuracy && metrics.avg_msg_chars <= self.stop_avg_len {
            Some(StopReason::Converged)
        } else if metrics.accuracy < self.accuracy_floor {
            Some(StopReason::Regressed)
        } else {
            None
        }
    }
}

/// Smoke-test acceptance thresholds. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeGuards {
    /// Highest tolerated parse-failure rate
    pub max_parse_fail: f64,
    /// Lowest tolerated accuracy
    pub min_accuracy: f64,
}

impl Default for SmokeGuards {
    fn default() -> Self {
        Self {
            max_parse_fail: 0.05,
            min_accuracy: 0.90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(accuracy: f64, avg_msg_chars: f64) -> Metrics {
        Metrics {
            accuracy,
            avg_msg_chars,
            ..Default::default()
        }
    }

    #[test]
    fn test_stop_reasons() {
        let cfg = EvolutionConfig::default();
        assert_eq!(cfg.stop_reason(&metrics(0.97, 8.0)), Some(StopReason::Converged));
        assert_eq!(cfg.stop_reason(&metrics(1.0, 33.0)), None);
        assert_eq!(cfg.stop_reason(&metrics(0.49, 4.0)), Some(StopReason::Regressed));
        assert_eq!(cfg.stop_reason(&metrics(0.5, 33.0)), None);
    }

    #[test]
    fn test_partial_toml_style_config() {
        let cfg: EvolutionConfig =
            serde_json::from_str(r#"{"rounds": 3, "smoke": {"min_accuracy": 0.8}}"#).unwrap();
        assert_eq!(cfg.rounds, 3);
        assert_eq!(cfg.smoke.min_accuracy, 0.8);
        assert_eq!(cfg.smoke.max_parse_fail, 0.05);
        assert_eq!(cfg.stop_accuracy, 0.97);
    }
}
