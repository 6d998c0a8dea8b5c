//! Environment settings.

use neuralese_core::Vocabulary;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::sampler::SceneSampler;

/// Scene vocabulary, scene size, batch size and random seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Attribute values
    pub vocabulary: Vocabulary,
    /// Objects per scene
    pub k_objects: usize,
    /// Scenes per round
    pub batch_size: usize,
    /// Seed for reproducible runs; fresh entropy when absent
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::default(),
            k_objects: 4,
            batch_size: 20,
            seed: None,
        }
    }
}

impl EnvConfig {
    /// Sampler over this vocabulary and scene size.
    pub fn sampler(&self) -> SceneSampler {
        SceneSampler::new(self.vocabulary.clone(), self.k_objects)
    }

    /// Random source honouring `seed`.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
