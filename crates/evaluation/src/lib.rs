//! Evaluation protocol and composite scoring.
//!
//! [`Evaluator`] plays every scene of a batch through the speaker and
//! listener and aggregates the outcome into [`Metrics`](neuralese_core::Metrics);
//! [`score`] folds metrics into the scalar used to rank grammar versions.

#![warn(missing_docs)]

mod aggregate;
mod evaluator;
mod scoring;

pub use aggregate::{avg_len, collision_rate, count_collisions};
pub use evaluator::{Evaluation, EvaluationError, Evaluator};
pub use scoring::{score, ScoreWeights};
