//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - VectorIndex: knowledge base lookup
//! - ModelClient: language model completion
//!
//! The core services take these as injected `Arc<dyn ...>` dependencies so
//! tests can substitute deterministic fakes.

pub mod model_client;
pub mod vector_index;

pub use model_client::{ModelClient, ModelHealth};
pub use vector_index::VectorIndex;
