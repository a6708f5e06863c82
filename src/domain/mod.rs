//! Domain layer for the triad pipeline
//!
//! This module contains the data model, error taxonomy and port traits.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, FailureKind, IndexError, ModelError};
