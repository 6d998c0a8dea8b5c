//! In-memory artifact store (testing and dry runs).

use std::collections::BTreeMap;

use async_trait::async_trait;
use neuralese_core::{BestBundle, Grammar, RoundRecord};

use crate::{ArtifactStore, Result};

/// Keeps every artifact in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryArtifactStore {
    rounds: Vec<RoundRecord>,
    snapshots: BTreeMap<usize, Grammar>,
    final_grammar: Option<Grammar>,
    best: Option<BestBundle>,
    best_writes: usize,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded rounds.
    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    /// Snapshot saved for `round`.
    pub fn snapshot(&self, round: usize) -> Option<&Grammar> {
        self.snapshots.get(&round)
    }

    /// The saved final grammar.
    pub fn final_grammar(&self) -> Option<&Grammar> {
        self.final_grammar.as_ref()
    }

    /// The saved best bundle.
    pub fn best(&self) -> Option<&BestBundle> {
        self.best.as_ref()
    }

    /// How many times the best bundle was written.
    pub fn best_writes(&self) -> usize {
        self.best_writes
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn record_round(&mut self, record: &RoundRecord) -> Result<()> {
        self.rounds.push(record.clone());
        Ok(())
    }

    async fn save_grammar_snapshot(&mut self, round: usize, grammar: &Grammar) -> Result<()> {
        self.snapshots.insert(round, grammar.clone());
        Ok(())
    }

    async fn save_final(&mut self, grammar: &Grammar) -> Result<()> {
        self.final_grammar = Some(grammar.clone());
        Ok(())
    }

    async fn save_best(&mut self, best: &BestBundle) -> Result<()> {
        self.best = Some(best.clone());
        self.best_writes += 1;
        Ok(())
    }

    async fn load_best(&self) -> Result<Option<BestBundle>> {
        Ok(self.best.clone())
    }

    async fn list_rounds(&self) -> Result<Vec<RoundRecord>> {
        Ok(self.rounds.clone())
    }
}
