//! Artifact store abstraction.

use async_trait::async_trait;
use neuralese_core::{BestBundle, Grammar, RoundRecord};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored grammar no longer parses
    #[error("stored grammar is invalid: {0}")]
    Grammar(#[from] neuralese_grammar::GrammarError),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Write-mostly sink for run artifacts.
///
/// The control loop treats every write as best-effort: failures are logged
/// and the run continues.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Append one round to the tabular log and the JSON-lines log.
    async fn record_round(&mut self, record: &RoundRecord) -> Result<()>;

    /// Save the grammar evaluated in `round`.
    async fn save_grammar_snapshot(&mut self, round: usize, grammar: &Grammar) -> Result<()>;

    /// Save the run's final grammar.
    async fn save_final(&mut self, grammar: &Grammar) -> Result<()>;

    /// Replace the stored best bundle.
    async fn save_best(&mut self, best: &BestBundle) -> Result<()>;

    /// Load the stored best bundle, if any.
    async fn load_best(&self) -> Result<Option<BestBundle>>;

    /// All rounds recorded in this run, in order.
    async fn list_rounds(&self) -> Result<Vec<RoundRecord>>;
}
