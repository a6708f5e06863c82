//! Domain errors for the triad pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by a vector index backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector index unreachable: {0}")]
    Unreachable(String),

    #[error("Vector index query timed out after {0}s")]
    Timeout(u64),

    #[error("Vector index returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Failures reported by a language model backend.
///
/// Only transport and availability problems live here. A response that
/// arrives but cannot be parsed is never a `ModelError`; the agents recover
/// from it locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model not configured: {0}")]
    NotConfigured(String),

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model call timed out after {0}s")]
    Timeout(u64),

    #[error("Model rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Model returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::RateLimited(_))
    }

    /// Classify this error for workflow reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::ModelTimeout,
            _ => FailureKind::ModelUnavailable,
        }
    }
}

/// Error kinds a workflow run can terminate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    RetrievalUnavailable,
    ModelUnavailable,
    ModelTimeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RetrievalUnavailable => "RetrievalUnavailable",
            Self::ModelUnavailable => "ModelUnavailable",
            Self::ModelTimeout => "ModelTimeout",
        };
        f.write_str(s)
    }
}

/// Domain-level errors that can occur in the triad system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_kind() {
        assert_eq!(ModelError::Timeout(30).kind(), FailureKind::ModelTimeout);
        assert_eq!(
            ModelError::Unavailable("down".into()).kind(),
            FailureKind::ModelUnavailable
        );
        assert_eq!(
            ModelError::NotConfigured("no model".into()).kind(),
            FailureKind::ModelUnavailable
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(ModelError::Unavailable("x".into()).is_transient());
        assert!(ModelError::RateLimited("x".into()).is_transient());
        assert!(!ModelError::Timeout(5).is_transient());
        assert!(!ModelError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn test_failure_kind_serializes_as_variant_name() {
        let json = serde_json::to_string(&FailureKind::ModelTimeout).unwrap();
        assert_eq!(json, "\"ModelTimeout\"");
        assert_eq!(FailureKind::RetrievalUnavailable.to_string(), "RetrievalUnavailable");
    }
}
