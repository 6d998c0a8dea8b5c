//! Task environment - scene sampling.
//!
//! Scenes are drawn from a [`Vocabulary`] with a caller-supplied random
//! source, so a seeded generator reproduces the same batches.

#![warn(missing_docs)]

mod config;
mod sampler;

pub use config::EnvConfig;
pub use sampler::{sample_batch, sample_scene, SamplerError, SceneSampler};
pub use neuralese_core::Vocabulary;
pub use rand::rngs::StdRng;
