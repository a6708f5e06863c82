//! Retrieved knowledge-base passages and the bounded context built from them.

use serde::{Deserialize, Serialize};

/// A single passage returned by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text.
    pub text: String,
    /// Where the passage came from (file path, document id, ...).
    pub source_id: String,
    /// Relevance score, higher is more relevant.
    pub score: f32,
}

impl RetrievedPassage {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            score,
        }
    }

    /// Render this passage as it appears inside a prompt.
    ///
    /// `position` is 1-based.
    pub fn render(&self, position: usize) -> String {
        format!(
            "[Context {}] (source: {}, score: {:.3})\n{}\n",
            position, self.source_id, self.score, self.text
        )
    }
}

/// Ordered passages that fit the configured character budget.
///
/// Invariant: passages are in descending score order and the rendered
/// block never exceeds the budget it was built with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    passages: Vec<RetrievedPassage>,
    /// Passages that were returned by the index but dropped for budget.
    #[serde(default)]
    dropped: usize,
}

impl RetrievalContext {
    /// An empty context (index reachable, no matches).
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(passages: Vec<RetrievedPassage>, dropped: usize) -> Self {
        Self { passages, dropped }
    }

    pub fn passages(&self) -> &[RetrievedPassage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Number of passages dropped to respect the budget.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Source ids of the surviving passages, in order.
    pub fn source_ids(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.source_id.clone()).collect()
    }

    /// Render the whole context block.
    pub fn render(&self) -> String {
        render_passages(&self.passages)
    }
}

/// Render passages in order, separated by blank lines.
pub(crate) fn render_passages(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| p.render(i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
