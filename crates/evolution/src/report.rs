//! Run report.

use neuralese_core::{BestBundle, FewShots, Grammar, RoundRecord, StopReason};
use serde::{Deserialize, Serialize};

use crate::metrics::RunStatistics;

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Last accepted grammar
    pub final_grammar: Grammar,
    /// Few-shots in use at the end
    pub fewshots: FewShots,
    /// Highest-scoring bundle, which may predate a later regression
    pub best: Option<BestBundle>,
    /// Every round, in order
    pub rounds: Vec<RoundRecord>,
    /// Why the loop ended
    pub stop: StopReason,
    /// Outcome counts
    pub statistics: RunStatistics,
}

impl RunReport {
    /// Assemble a report; statistics are derived from `rounds`.
    pub fn new(
        final_grammar: Grammar,
        fewshots: FewShots,
        best: Option<BestBundle>,
        rounds: Vec<RoundRecord>,
        stop: StopReason,
    ) -> Self {
        Self {
            statistics: RunStatistics::from_rounds(&rounds),
            final_grammar,
            fewshots,
            best,
            rounds,
            stop,
        }
    }

    /// One line per round: index, accuracy, length, rules, outcome.
    pub fn table(&self) -> String {
        let mut out = String::from("round  acc    len    rules  score    outcome\n");
        for r in &self.rounds {
            out.push_str(&format!(
                "{:<6} {:<6.3} {:<6.1} {:<6} {:<8.3} {}\n",
                r.round,
                r.metrics.accuracy,
                r.metrics.avg_msg_chars,
                r.metrics.complexity.rule_count,
                r.score,
                r.outcome.note()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuralese_core::{Metrics, RoundOutcome, SkipReason};

    fn record(round: usize, score: f64, outcome: RoundOutcome) -> RoundRecord {
        RoundRecord {
            round,
            grammar: Grammar::base(),
            metrics: Metrics {
                accuracy: 1.0,
                avg_msg_chars: 31.0,
                complexity: Grammar::base().complexity(),
                ..Default::default()
            },
            score,
            patch: None,
            smoke: None,
            outcome,
            recorded_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_report_derives_statistics() {
        let report = RunReport::new(
            Grammar::base(),
            FewShots::default(),
            None,
            vec![
                record(0, 0.5, RoundOutcome::Accepted),
                record(1, 0.25, RoundOutcome::Skipped(SkipReason::NoChange)),
            ],
            StopReason::BudgetExhausted,
        );
        assert_eq!(report.statistics.accepted, 1);
        assert_eq!(report.statistics.skipped, 1);
        assert_eq!(report.statistics.best_score, Some(0.5));
    }

    #[test]
    fn test_table_has_one_line_per_round() {
        let report = RunReport::new(
            Grammar::base(),
            FewShots::default(),
            None,
            vec![
                record(0, 0.5, RoundOutcome::Accepted),
                record(1, 0.25, RoundOutcome::Skipped(SkipReason::NoChange)),
            ],
            StopReason::BudgetExhausted,
        );
        let table = report.table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("round  acc"));
        assert_eq!(lines[1], "0      1.000  31.0   5      0.500    accepted");
        assert!(lines[2].ends_with("skipped: no change"));
    }
}
