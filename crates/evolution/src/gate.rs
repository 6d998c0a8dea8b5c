//! Smoke-test accept/reject gate.

use neuralese_core::{Metrics, RejectReason};

use crate::config::SmokeGuards;

/// Gate decision for a candidate grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Candidate becomes the current grammar
    Accept,
    /// Candidate is discarded
    Reject(RejectReason),
}

/// Checks smoke-test metrics against [`SmokeGuards`].
#[derive(Debug, Clone, Copy)]
pub struct SmokeGate {
    guards: SmokeGuards,
}

impl SmokeGate {
    /// Create a gate.
    pub fn new(guards: SmokeGuards) -> Self {
        Self { guards }
    }

    /// Accept iff parse-fail ≤ ceiling and accuracy ≥ floor.
    pub fn check(&self, smoke: &Metrics) -> GateDecision {
        if smoke.parse_fail_rate > self.guards.max_parse_fail {
            return GateDecision::Reject(RejectReason::ParseFailures {
                rate: smoke.parse_fail_rate,
                ceiling: self.guards.max_parse_fail,
            });
        }
        if smoke.accuracy < self.guards.min_accuracy {
            return GateDecision::Reject(RejectReason::Accuracy {
                accuracy: smoke.accuracy,
                floor: self.guards.min_accuracy,
            });
        }
        GateDecision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smoke(accuracy: f64, parse_fail_rate: f64) -> Metrics {
        Metrics {
            accuracy,
            parse_fail_rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_gate_bounds_inclusive() {
        let gate = SmokeGate::new(SmokeGuards::default());
        assert_eq!(gate.check(&smoke(0.90, 0.05)), GateDecision::Accept);
        assert_eq!(gate.check(&smoke(1.0, 0.0)), GateDecision::Accept);
    }

    #[test]
    fn test_gate_rejections() {
        let gate = SmokeGate::new(SmokeGuards::default());
        assert!(matches!(
            gate.check(&smoke(1.0, 0.1)),
            GateDecision::Reject(RejectReason::ParseFailures { .. })
        ));
        assert!(matches!(
            gate.check(&smoke(0.85, 0.0)),
            GateDecision::Reject(RejectReason::Accuracy { .. })
        ));
    }
}
