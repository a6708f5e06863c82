//! Vector index port.
//!
//! The knowledge base is populated out of band; the pipeline only queries it.

use async_trait::async_trait;

use crate::domain::errors::IndexError;
use crate::domain::models::RetrievedPassage;

/// Nearest-neighbour lookup over an external knowledge base.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name (e.g., "chroma", "fixed").
    fn name(&self) -> &str;

    /// Return up to `k` passages relevant to `text`.
    ///
    /// An index that is reachable but has nothing relevant returns an empty
    /// list, never an error.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>, IndexError>;
}
