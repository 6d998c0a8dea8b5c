//! Configuration file and command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use neuralese_env::EnvConfig;
use neuralese_evaluation::ScoreWeights;
use neuralese_evolution::EvolutionConfig;
use neuralese_oracle::{OpenAiConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG: &str = "neuralese.toml";

/// Oracle client settings plus per-call limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Model, endpoint and temperatures
    #[serde(flatten)]
    pub client: OpenAiConfig,
    /// Timeout and retries
    #[serde(flatten)]
    pub retry: RetryPolicy,
}

/// Everything a command needs. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where run artifacts and the best bundle live
    pub artifacts_dir: PathBuf,
    /// Scene sampling
    pub env: EnvConfig,
    /// Control loop
    pub evolution: EvolutionConfig,
    /// Score weights
    pub scoring: ScoreWeights,
    /// Oracle client
    pub oracle: OracleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            env: EnvConfig::default(),
            evolution: EvolutionConfig::default(),
            scoring: ScoreWeights::default(),
            oracle: OracleSettings::default(),
        }
    }
}

/// Values given on the command line win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub batch_size: Option<usize>,
    pub rounds: Option<usize>,
    pub seed: Option<u64>,
    pub artifacts_dir: Option<PathBuf>,
}

impl Settings {
    /// Load `path`, or `neuralese.toml` if present, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG).exists() => Self::from_file(Path::new(DEFAULT_CONFIG)),
            None => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(batch_size) = overrides.batch_size {
            self.env.batch_size = batch_size;
        }
        if let Some(rounds) = overrides.rounds {
            self.evolution.rounds = rounds;
        }
        if let Some(seed) = overrides.seed {
            self.env.seed = Some(seed);
        }
        if let Some(dir) = overrides.artifacts_dir {
            self.artifacts_dir = dir;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let settings: Settings = toml::from_str(
            r#"
            artifacts_dir = "out"

            [env]
            k_objects = 3
            seed = 42

            [evolution]
            rounds = 4
            fallback_patch = true

            [evolution.smoke]
            min_accuracy = 0.8

            [scoring]
            collisions = 2.0

            [oracle]
            model = "gpt-5-mini"
            timeout_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(settings.artifacts_dir, PathBuf::from("out"));
        assert_eq!(settings.env.k_objects, 3);
        assert_eq!(settings.env.batch_size, 20);
        assert_eq!(settings.env.seed, Some(42));
        assert_eq!(settings.evolution.rounds, 4);
        assert!(settings.evolution.fallback_patch);
        assert_eq!(settings.evolution.smoke.min_accuracy, 0.8);
        assert_eq!(settings.evolution.smoke.max_parse_fail, 0.05);
        assert_eq!(settings.scoring.collisions, 2.0);
        assert_eq!(settings.scoring.len_per_char, 0.02);
        assert_eq!(settings.oracle.client.model, "gpt-5-mini");
        assert_eq!(settings.oracle.retry.timeout_ms, 1000);
        assert_eq!(settings.oracle.retry.max_retries, 2);
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings::default().with_overrides(Overrides {
            batch_size: Some(5),
            rounds: Some(2),
            seed: Some(1),
            artifacts_dir: None,
        });
        assert_eq!(settings.env.batch_size, 5);
        assert_eq!(settings.evolution.rounds, 2);
        assert_eq!(settings.env.seed, Some(1));
        assert_eq!(settings.artifacts_dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[evolution]\nrounds = 7\n").unwrap();
        assert_eq!(Settings::load(Some(&path)).unwrap().evolution.rounds, 7);
        assert!(Settings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
