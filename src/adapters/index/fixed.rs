//! In-memory vector index returning a fixed passage list.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::IndexError;
use crate::domain::models::RetrievedPassage;
use crate::domain::ports::VectorIndex;

/// A [`VectorIndex`] that ignores the query and returns its stored
/// passages (first `k`, in stored order), or a configured failure.
#[derive(Debug, Clone, Default)]
pub struct FixedIndex {
    passages: Vec<RetrievedPassage>,
    failure: Option<IndexError>,
    delay: Option<Duration>,
}

impl FixedIndex {
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self {
            passages,
            ..Self::default()
        }
    }

    /// An index that always fails with `error`.
    pub fn failing(error: IndexError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A small knowledge base matching the demo model responses.
    pub fn demo() -> Self {
        Self::new(vec![
            RetrievedPassage::new(
                "Services in this repository use FastAPI. Routes live in app/main.py.",
                "docs/architecture.md",
                0.82,
            ),
            RetrievedPassage::new(
                "Health endpoints must not call databases or other services.",
                "docs/operations.md",
                0.74,
            ),
        ])
    }
}

#[async_trait]
impl VectorIndex for FixedIndex {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn query(&self, _text: &str, k: usize) -> Result<Vec<RetrievedPassage>, IndexError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.passages.iter().take(k).cloned().collect())
    }
}
