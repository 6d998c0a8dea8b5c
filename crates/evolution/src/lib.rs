//! Evolution layer - round-based grammar search under regression guards.

#![warn(missing_docs, unused_crate_dependencies)]

mod config;
mod engine;
mod error;
mod gate;
mod metrics;
mod report;

pub use config::{EvolutionConfig, SmokeGuards};
pub use engine::{EvolutionEngine, RoundStep};
pub use error::EvolutionError;
pub use gate::{GateDecision, SmokeGate};
pub use metrics::RunStatistics;
pub use report::RunReport;

#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio as _;
