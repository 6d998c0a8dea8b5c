//! Round records, outcomes and the best-so-far bundle.

use neuralese_grammar::Grammar;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::example::FewShots;
use crate::metrics::Metrics;
use crate::patch::Patch;
use crate::Time;

/// Why the control loop ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Accuracy and length targets met.
    Converged,
    /// Accuracy fell below the floor.
    Regressed,
    /// Round budget used up.
    BudgetExhausted,
    /// The oracle reported a hard failure.
    OracleUnavailable {
        /// Failure description
        message: String,
    },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Converged => f.write_str("converged"),
            StopReason::Regressed => f.write_str("regressed below accuracy floor"),
            StopReason::BudgetExhausted => f.write_str("round budget exhausted"),
            StopReason::OracleUnavailable { message } => write!(f, "oracle unavailable: {}", message),
        }
    }
}

/// Why a round left the grammar unchanged without trying a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The proposer call failed.
    ProposerFailed {
        /// Failure description
        message: String,
    },
    /// The proposed patch failed structural validation.
    InvalidPatch {
        /// Validation failure
        message: String,
    },
    /// The patch changes neither grammar nor few-shots.
    NoChange,
}

/// Why a candidate grammar was discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// An edit failed or produced a malformed grammar.
    InvalidEdit {
        /// Edit failure
        message: String,
    },
    /// Smoke-test parse failures above the ceiling.
    ParseFailures {
        /// Observed rate
        rate: f64,
        /// Configured ceiling
        ceiling: f64,
    },
    /// Smoke-test accuracy below the floor.
    Accuracy {
        /// Observed accuracy
        accuracy: f64,
        /// Configured floor
        floor: f64,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidEdit { message } => write!(f, "invalid edit: {}", message),
            RejectReason::ParseFailures { rate, ceiling } => {
                write!(f, "parse-fail {:.3} > {:.3}", rate, ceiling)
            }
            RejectReason::Accuracy { accuracy, floor } => {
                write!(f, "accuracy {:.3} < {:.3}", accuracy, floor)
            }
        }
    }
}

/// What happened to the grammar in a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    /// The candidate replaced the current grammar.
    Accepted,
    /// The candidate was discarded.
    Rejected(RejectReason),
    /// No candidate was tried.
    Skipped(SkipReason),
    /// A stop condition fired before proposing.
    Stopped(StopReason),
}

impl RoundOutcome {
    /// Short note for the tabular round log.
    pub fn note(&self) -> String {
        match self {
            RoundOutcome::Accepted => "accepted".to_string(),
            RoundOutcome::Rejected(reason) => format!("rejected: {}", reason),
            RoundOutcome::Skipped(SkipReason::ProposerFailed { message }) => {
                format!("skipped: proposer failed: {}", message)
            }
            RoundOutcome::Skipped(SkipReason::InvalidPatch { message }) => {
                format!("skipped: invalid patch: {}", message)
            }
            RoundOutcome::Skipped(SkipReason::NoChange) => "skipped: no change".to_string(),
            RoundOutcome::Stopped(reason) => format!("stopped: {}", reason),
        }
    }

    /// Whether the round changed the current grammar.
    pub fn is_accepted(&self) -> bool {
        matches!(self, RoundOutcome::Accepted)
    }
}

/// One entry of the append-only round log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 0-based round index
    pub round: usize,
    /// Grammar evaluated this round
    pub grammar: Grammar,
    /// Its metrics on the round's batch
    pub metrics: Metrics,
    /// Composite score
    pub score: f64,
    /// Proposed patch, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
    /// Candidate's smoke-test metrics, if one was tried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoke: Option<Metrics>,
    /// What happened
    pub outcome: RoundOutcome,
    /// When the round finished
    pub recorded_at: Time,
}

/// Highest-scoring grammar observed in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestBundle {
    /// The grammar
    pub grammar: Grammar,
    /// Few-shots derived for it
    pub fewshots: FewShots,
    /// Its composite score
    pub score: f64,
    /// Round it was observed in
    pub round: usize,
    /// Metrics behind the score
    pub metrics: Metrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_notes() {
        assert_eq!(RoundOutcome::Accepted.note(), "accepted");
        let rejected = RoundOutcome::Rejected(RejectReason::Accuracy {
            accuracy: 0.5,
            floor: 0.9,
        });
        assert_eq!(rejected.note(), "rejected: accuracy 0.500 < 0.900");
        assert_eq!(
            RoundOutcome::Stopped(StopReason::Converged).note(),
            "stopped: converged"
        );
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(RoundOutcome::Skipped(SkipReason::NoChange)).unwrap();
        assert_eq!(json["outcome"], "skipped");
    }
}
