//! Retrieval context builder.
//!
//! Queries the vector index and renders the hits into a bounded block of
//! prompt text. Passages are kept whole; when the block is over budget the
//! lowest-scoring passages are dropped from the tail.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::domain::errors::IndexError;
use crate::domain::models::passage::render_passages;
use crate::domain::models::{RetrievalContext, RetrievedPassage};
use crate::domain::ports::VectorIndex;

/// Default per-call timeout for index lookups.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds [`RetrievalContext`]s from an injected vector index.
#[derive(Clone)]
pub struct RetrievalContextBuilder {
    index: Arc<dyn VectorIndex>,
    max_chars: usize,
    timeout: Duration,
}

impl RetrievalContextBuilder {
    pub fn new(index: Arc<dyn VectorIndex>, max_chars: usize) -> Self {
        Self {
            index,
            max_chars,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    /// Fetch up to `k` passages for `query` and fit them to the budget.
    ///
    /// A reachable index with no matches yields an empty context. Any
    /// failure to reach the index is returned as an error.
    #[instrument(skip(self, query), fields(index = %self.index.name(), k))]
    pub async fn build(&self, query: &str, k: usize) -> Result<RetrievalContext, IndexError> {
        if k == 0 {
            return Ok(RetrievalContext::empty());
        }

        let passages = tokio::time::timeout(self.timeout, self.index.query(query, k))
            .await
            .map_err(|_| IndexError::Timeout(self.timeout.as_secs()))??;

        let returned = passages.len();
        let context = assemble(passages, k, self.max_chars);

        if context.dropped() > 0 {
            warn!(
                returned,
                kept = context.len(),
                dropped = context.dropped(),
                max_chars = self.max_chars,
                "Retrieval context over budget, dropped lowest-score passages"
            );
        } else {
            debug!(returned, kept = context.len(), "Retrieval context built");
        }

        Ok(context)
    }
}

/// Order, cap and budget a raw hit list.
///
/// Passages are stable-sorted by descending score (NaN last), the first `k`
/// are kept, then passages are dropped from the tail until the rendered
/// block is at most `max_chars` characters.
pub fn assemble(mut passages: Vec<RetrievedPassage>, k: usize, max_chars: usize) -> RetrievalContext {
    passages.sort_by(|a, b| by_descending_score(a.score, b.score));

    let mut dropped = passages.len().saturating_sub(k);
    passages.truncate(k);

    while !passages.is_empty() && render_passages(&passages).chars().count() > max_chars {
        passages.pop();
        dropped += 1;
    }

    RetrievalContext::from_parts(passages, dropped)
}

fn by_descending_score(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::index::FixedIndex;
    use proptest::prelude::*;

    fn passage(text: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage::new(text, format!("{text}.md"), score)
    }

    #[test]
    fn test_assemble_sorts_descending() {
        let ctx = assemble(
            vec![passage("low", 0.1), passage("high", 0.9), passage("mid", 0.5)],
            10,
            10_000,
        );
        let texts: Vec<_> = ctx.passages().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["high", "mid", "low"]);
        assert_eq!(ctx.dropped(), 0);
    }

    #[test]
    fn test_assemble_ties_keep_index_order() {
        let ctx = assemble(
            vec![passage("first", 0.5), passage("second", 0.5), passage("third", 0.5)],
            10,
            10_000,
        );
        let texts: Vec<_> = ctx.passages().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_assemble_nan_sorts_last() {
        let ctx = assemble(vec![passage("nan", f32::NAN), passage("real", 0.2)], 10, 10_000);
        assert_eq!(ctx.passages()[0].text, "real");
        assert_eq!(ctx.passages()[1].text, "nan");
    }

    #[test]
    fn test_assemble_drops_lowest_score_for_budget() {
        let a = passage(&"a".repeat(100), 0.9);
        let b = passage(&"b".repeat(100), 0.8);
        let c = passage(&"c".repeat(100), 0.7);
        let two = render_passages(&[a.clone(), b.clone()]).chars().count();

        let ctx = assemble(vec![c, a.clone(), b.clone()], 10, two);
        assert_eq!(ctx.passages(), &[a, b]);
        assert_eq!(ctx.dropped(), 1);
        assert!(ctx.render().chars().count() <= two);
    }

    #[test]
    fn test_assemble_single_oversized_passage_is_dropped_not_cut() {
        let ctx = assemble(vec![passage(&"x".repeat(500), 1.0)], 3, 50);
        assert!(ctx.is_empty());
        assert_eq!(ctx.dropped(), 1);
    }

    #[test]
    fn test_assemble_caps_at_k() {
        let ctx = assemble(
            (0..6u8).map(|i| passage(&format!("p{i}"), f32::from(i))).collect(),
            3,
            10_000,
        );
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.passages()[0].text, "p5");
        assert_eq!(ctx.dropped(), 3);
    }

    #[tokio::test]
    async fn test_build_empty_index_is_not_an_error() {
        let builder = RetrievalContextBuilder::new(Arc::new(FixedIndex::new(vec![])), 1_000);
        let ctx = builder.build("anything", 5).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_build_propagates_unreachable() {
        let builder = RetrievalContextBuilder::new(
            Arc::new(FixedIndex::failing(IndexError::Unreachable("connection refused".into()))),
            1_000,
        );
        let err = builder.build("anything", 5).await.unwrap_err();
        assert!(matches!(err, IndexError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_build_times_out() {
        let index = FixedIndex::new(vec![passage("slow", 0.5)]).with_delay(Duration::from_millis(200));
        let builder = RetrievalContextBuilder::new(Arc::new(index), 1_000)
            .with_timeout(Duration::from_millis(20));
        let err = builder.build("anything", 5).await.unwrap_err();
        assert!(matches!(err, IndexError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_build_with_zero_k_skips_index() {
        let builder = RetrievalContextBuilder::new(
            Arc::new(FixedIndex::failing(IndexError::Unreachable("down".into()))),
            1_000,
        );
        assert!(builder.build("anything", 0).await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_context_is_descending_and_within_budget(
            scores in prop::collection::vec(0.0f32..1.0, 0..20),
            k in 1usize..25,
            max_chars in 0usize..2_000,
        ) {
            let passages: Vec<_> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| RetrievedPassage::new(format!("passage {i} {}", "z".repeat(i * 7)), format!("s{i}"), *s))
                .collect();

            let ctx = assemble(passages.clone(), k, max_chars);

            prop_assert!(ctx.len() <= k);
            prop_assert!(ctx.render().chars().count() <= max_chars);
            for pair in ctx.passages().windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            // Survivors are whole passages from the input.
            for p in ctx.passages() {
                prop_assert!(passages.contains(p));
            }
            prop_assert_eq!(ctx.len() + ctx.dropped(), passages.len());
        }
    }
}
