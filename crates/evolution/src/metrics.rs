//! Run statistics.

use neuralese_core::{RoundOutcome, RoundRecord};
use serde::{Deserialize, Serialize};

/// Outcome counts and score trajectory over a run's rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Rounds recorded
    pub rounds: usize,
    /// Patches accepted
    pub accepted: usize,
    /// Candidates rejected by the gate or edit validation
    pub rejected: usize,
    /// Rounds without a candidate
    pub skipped: usize,
    /// Acceptance rate over rounds that tried a candidate
    pub acceptance_rate: f64,
    /// Highest score seen
    pub best_score: Option<f64>,
    /// Score of the last round
    pub last_score: Option<f64>,
}

impl RunStatistics {
    /// Summarize `rounds`.
    pub fn from_rounds(rounds: &[RoundRecord]) -> Self {
        let mut stats = Self {
            rounds: rounds.len(),
            ..Default::default()
        };
        for record in rounds {
            match record.outcome {
                RoundOutcome::Accepted => stats.accepted += 1,
                RoundOutcome::Rejected(_) => stats.rejected += 1,
                RoundOutcome::Skipped(_) => stats.skipped += 1,
                RoundOutcome::Stopped(_) => {}
            }
            stats.best_score = Some(match stats.best_score {
                Some(best) => best.max(record.score),
                None => record.score,
            });
        }
        let tried = stats.accepted + stats.rejected;
        if tried > 0 {
            stats.acceptance_rate = stats.accepted as f64 / tried as f64;
        }
        stats.last_score = rounds.last().map(|r| r.score);
        stats
    }
}
