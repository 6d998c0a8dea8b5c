//! Evolution errors.

use neuralese_env::SamplerError;

/// Failures that end a run without a result.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    /// No scenes could be sampled.
    #[error("scene sampling failed: {0}")]
    Sampler(#[from] SamplerError),
}
