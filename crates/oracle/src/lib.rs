//! Oracle capabilities.
//!
//! The speaker, listener and proposer are external text-generation services.
//! This crate defines their async interfaces, the three-way failure model,
//! a timeout and retry guard, an HTTP client for the OpenAI Responses API
//! and in-memory fakes for tests.

#![warn(missing_docs)]

mod error;
mod guard;
mod openai;
mod prompts;
mod traits;

pub mod fakes;

pub use error::{FailureClass, OracleError};
pub use guard::{guarded, GuardedOracle, RetryPolicy};
pub use openai::{OpenAiConfig, OpenAiOracle};
pub use prompts::{index_grammar, ChatMessage, Role};
pub use traits::{Listener, Oracle, Proposer, Speaker};
