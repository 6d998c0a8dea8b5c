//! Oracle failures and their classification.

use serde::{Deserialize, Serialize};

/// How the caller should treat a failed oracle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Count against the scene (or skip the proposal) and move on.
    Soft,
    /// Worth retrying; soft once retries run out.
    Transient,
    /// Abort the batch and stop the run.
    Hard,
}

/// Oracle call failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    /// No legal output could be produced.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Output arrived but could not be interpreted.
    #[error("malformed output: {0}")]
    Malformed(String),

    /// The call exceeded its time limit.
    #[error("timed out after {elapsed_ms}ms")]
    Timeout {
        /// Configured limit
        elapsed_ms: u64,
    },

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("service error (status {status}): {message}")]
    Service {
        /// HTTP status
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The service cannot be used at all (e.g. missing credentials).
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

impl OracleError {
    /// Classify this failure.
    pub fn class(&self) -> FailureClass {
        match self {
            OracleError::Generation(_) | OracleError::Malformed(_) => FailureClass::Soft,
            OracleError::Timeout { .. } | OracleError::Transport(_) => FailureClass::Transient,
            OracleError::Service { status, .. } => match status {
                401 | 403 => FailureClass::Hard,
                429 | 500..=599 => FailureClass::Transient,
                _ => FailureClass::Soft,
            },
            OracleError::Unavailable(_) => FailureClass::Hard,
        }
    }

    /// Whether this failure must abort the batch.
    pub fn is_hard(&self) -> bool {
        self.class() == FailureClass::Hard
    }
}
