//! File-backed artifact store.
//!
//! Layout under the artifacts root:
//!
//! ```text
//! runs/<run_id>/round_log.csv
//! runs/<run_id>/rounds.jsonl
//! runs/<run_id>/grammars/round_NNN.lark
//! runs/<run_id>/final_grammar.lark
//! best/grammar.lark
//! best/fewshots.json
//! best/meta.json
//! ```

use std::path::{Path, PathBuf};

use neuralese_core::{BestBundle, FewShots, Grammar, Metrics, RoundRecord, RunId, Time};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ArtifactStore, Result};

const CSV_HEADER: &str =
    "round,accuracy,avg_len,productions,mean_rhs_symbols,collisions,parse_fail,score,note";

/// Everything in the best bundle except the grammar and few-shots.
#[derive(Debug, Serialize, Deserialize)]
struct BestMeta {
    score: f64,
    round: usize,
    metrics: Metrics,
    saved_at: Time,
}

/// Stores artifacts as plain files.
pub struct JsonArtifactStore {
    root: PathBuf,
    run_dir: PathBuf,
    run_id: RunId,
}

impl JsonArtifactStore {
    /// Create the directories for `run_id` under `root`.
    pub async fn new(root: impl AsRef<Path>, run_id: RunId) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let run_dir = root.join("runs").join(run_id.to_string());

        fs::create_dir_all(run_dir.join("grammars")).await?;
        fs::create_dir_all(root.join("best")).await?;

        Ok(Self {
            root,
            run_dir,
            run_id,
        })
    }

    /// Open `root` for reading the best bundle only; no run directory is created.
    pub fn open(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let run_id = RunId::new();
        Self {
            run_dir: root.join("runs").join(run_id.to_string()),
            root,
            run_id,
        }
    }

    /// This run's identifier.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// This run's directory.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn best_dir(&self) -> PathBuf {
        self.root.join("best")
    }

    fn snapshot_path(&self, round: usize) -> PathBuf {
        self.run_dir.join("grammars").join(format!("round_{:03}.lark", round))
    }

    async fn append(&self, path: &Path, line: &str, header: Option<&str>) -> Result<()> {
        let is_new = !fs::try_exists(path).await?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        if is_new {
            if let Some(header) = header {
                file.write_all(format!("{}\n", header).as_bytes()).await?;
            }
        }
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ArtifactStore for JsonArtifactStore {
    async fn record_round(&mut self, record: &RoundRecord) -> Result<()> {
        self.append(&self.run_dir.join("round_log.csv"), &csv_row(record), Some(CSV_HEADER))
            .await?;
        let json = serde_json::to_string(record)?;
        self.append(&self.run_dir.join("rounds.jsonl"), &json, None).await?;
        debug!("Recorded round {} in {}", record.round, self.run_dir.display());
        Ok(())
    }

    async fn save_grammar_snapshot(&mut self, round: usize, grammar: &Grammar) -> Result<()> {
        fs::write(self.snapshot_path(round), grammar.render()).await?;
        Ok(())
    }

    async fn save_final(&mut self, grammar: &Grammar) -> Result<()> {
        fs::write(self.run_dir.join("final_grammar.lark"), grammar.render()).await?;
        Ok(())
    }

    async fn save_best(&mut self, best: &BestBundle) -> Result<()> {
        let dir = self.best_dir();
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join("grammar.lark"), best.grammar.render()).await?;
        fs::write(
            dir.join("fewshots.json"),
            serde_json::to_string_pretty(&best.fewshots)?,
        )
        .await?;
        let meta = BestMeta {
            score: best.score,
            round: best.round,
            metrics: best.metrics.clone(),
            saved_at: chrono::Utc::now(),
        };
        fs::write(dir.join("meta.json"), serde_json::to_string_pretty(&meta)?).await?;
        debug!("Saved best bundle (score {:.3}, round {})", best.score, best.round);
        Ok(())
    }

    async fn load_best(&self) -> Result<Option<BestBundle>> {
        let dir = self.best_dir();
        let grammar_text = match fs::read_to_string(dir.join("grammar.lark")).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let grammar = Grammar::parse(&grammar_text)?;
        let fewshots: FewShots = read_json(&dir.join("fewshots.json")).await?.unwrap_or_default();
        let meta: Option<BestMeta> = read_json(&dir.join("meta.json")).await?;

        Ok(Some(match meta {
            Some(meta) => BestBundle {
                grammar,
                fewshots,
                score: meta.score,
                round: meta.round,
                metrics: meta.metrics,
            },
            None => BestBundle {
                grammar,
                fewshots,
                score: f64::NEG_INFINITY,
                round: 0,
                metrics: Metrics::default(),
            },
        }))
    }

    async fn list_rounds(&self) -> Result<Vec<RoundRecord>> {
        let text = match fs::read_to_string(self.run_dir.join("rounds.jsonl")).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Into::into))
            .collect()
    }
}

fn csv_row(record: &RoundRecord) -> String {
    let m = &record.metrics;
    format!(
        "{},{:.4},{:.2},{},{:.3},{:.4},{:.4},{:.4},{}",
        record.round,
        m.accuracy,
        m.avg_msg_chars,
        m.complexity.rule_count,
        m.complexity.mean_rhs_symbols,
        m.collision_rate,
        m.parse_fail_rate,
        record.score,
        csv_field(&record.outcome.note()),
    )
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuralese_core::{RejectReason, RoundOutcome};
    use tempfile::TempDir;

    fn record(round: usize, outcome: RoundOutcome) -> RoundRecord {
        RoundRecord {
            round,
            grammar: Grammar::base(),
            metrics: Metrics {
                accuracy: 1.0,
                avg_msg_chars: 33.0,
                ..Default::default()
            },
            score: -2.1,
            patch: None,
            smoke: None,
            outcome,
            recorded_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_round_log() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonArtifactStore::new(dir.path(), RunId::new()).await.unwrap();

        store.record_round(&record(0, RoundOutcome::Accepted)).await.unwrap();
        let rejected = RoundOutcome::Rejected(RejectReason::ParseFailures {
            rate: 0.5,
            ceiling: 0.05,
        });
        store.record_round(&record(1, rejected)).await.unwrap();

        let csv = std::fs::read_to_string(store.run_dir().join("round_log.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("0,1.0000,33.00,"));
        assert!(lines[1].ends_with(",accepted"));

        let rounds = store.list_rounds().await.unwrap();
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[1].round, 1);
        assert_eq!(rounds[1].grammar, Grammar::base());
    }

    #[tokio::test]
    async fn test_snapshots_and_final() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonArtifactStore::new(dir.path(), RunId::new()).await.unwrap();
        store.save_grammar_snapshot(3, &Grammar::base()).await.unwrap();
        store.save_final(&Grammar::base()).await.unwrap();

        let snapshot = std::fs::read_to_string(store.run_dir().join("grammars/round_003.lark")).unwrap();
        assert_eq!(Grammar::parse(&snapshot).unwrap(), Grammar::base());
        assert!(store.run_dir().join("final_grammar.lark").exists());
    }

    #[tokio::test]
    async fn test_best_bundle_persists_across_runs() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonArtifactStore::new(dir.path(), RunId::new()).await.unwrap();
        assert!(store.load_best().await.unwrap().is_none());

        let best = BestBundle {
            grammar: Grammar::base(),
            fewshots: FewShots::default(),
            score: 0.75,
            round: 4,
            metrics: Metrics::default(),
        };
        store.save_best(&best).await.unwrap();

        let reader = JsonArtifactStore::open(dir.path());
        assert_eq!(reader.load_best().await.unwrap(), Some(best));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("accepted"), "accepted");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
