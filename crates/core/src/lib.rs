//! Neuralese core data models.
//!
//! This crate defines the data structures shared by the protocol search:
//! scenes, messages, metrics, patches and the round log.

#![warn(missing_docs)]

// Identities
mod id;

// Task environment
mod scene;
mod example;

// Evaluation and search
mod metrics;
mod patch;
mod round;

// Re-exports
pub use id::RunId;

pub use scene::{Scene, SceneError, SceneObject, Vocabulary};
pub use example::{Example, FewShots, ListenerShot, Message, SpeakerShot};

pub use metrics::Metrics;
pub use patch::{Patch, PatchError};
pub use round::{BestBundle, RejectReason, RoundOutcome, RoundRecord, SkipReason, StopReason};

pub use neuralese_grammar::{Grammar, GrammarComplexity, Mutation};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
