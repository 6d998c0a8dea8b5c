//! Artifact persistence for protocol-search runs.
//!
//! This crate provides a trait-based artifact interface with a file-backed
//! reference implementation and an in-memory one for tests.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{ArtifactStore, StorageError, Result};
pub use json_storage::JsonArtifactStore;
pub use memory::MemoryArtifactStore;
