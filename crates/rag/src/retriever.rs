//! Retriever
//!
//! Turns an utterance into scored knowledge candidates: embeds the query
//! (with bounded retry when the embedding backend is down), searches the
//! active index snapshot, and filters by the minimum score threshold.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use faq_agent_core::{Embedder, Error, Result, ScoredEntry};

use crate::index::SharedIndex;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Candidates returned per query
    pub top_k: usize,
    /// Minimum similarity score for a candidate to be kept
    pub min_score: f32,
    /// Total embed attempts before giving up
    pub max_attempts: u32,
    /// Initial backoff between attempts, doubled each retry
    pub backoff_initial: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.3,
            max_attempts: 3,
            backoff_initial: Duration::from_millis(50),
        }
    }
}

impl RetrieverConfig {
    pub fn from_settings(retrieval: &faq_agent_config::RetrievalConfig) -> Self {
        Self {
            top_k: retrieval.top_k,
            min_score: retrieval.min_score,
            max_attempts: retrieval.max_attempts,
            backoff_initial: Duration::from_millis(retrieval.backoff_initial_ms),
        }
    }
}

/// Retrieval engine over the shared embedding index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: SharedIndex,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: SharedIndex, config: RetrieverConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Retrieve candidates for a query.
    ///
    /// Returns at most `top_k` entries scoring at least `min_score`,
    /// highest first. An empty result is a valid outcome, not an error;
    /// the caller decides how an ungrounded turn is answered.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredEntry>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".into()));
        }

        let vector = self.embed_with_retry(query).await?;
        let index = self.index.load();
        let candidates = index.search(&vector, self.config.top_k)?;

        let kept: Vec<ScoredEntry> = candidates
            .into_iter()
            .filter(|c| c.score >= self.config.min_score)
            .collect();

        debug!(
            query_len = query.len(),
            candidates = kept.len(),
            top_score = kept.first().map(|c| c.score).unwrap_or(0.0),
            "Retrieval complete"
        );

        Ok(kept)
    }

    /// Embed with bounded exponential backoff on transient failures.
    async fn embed_with_retry(&self, query: &str) -> Result<Vec<f32>> {
        let mut backoff = self.config.backoff_initial;
        let mut attempt = 1;

        loop {
            match self.embedder.embed(query).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    warn!(attempt, error = %e, "Embedding failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EmbeddingIndex;
    use async_trait::async_trait;
    use faq_agent_core::KnowledgeEntry;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                t if t.contains("hours") => vec![1.0, 0.0, 0.0],
                t if t.contains("refund") => vec![0.0, 1.0, 0.0],
                _ => vec![0.577, 0.577, 0.577],
            })
        }

        fn dim(&self) -> usize {
            3
        }

        fn model_version(&self) -> &str {
            "axis-v1"
        }
    }

    /// Fails a configured number of times before succeeding.
    struct FlakyEmbedder {
        failures: AtomicU32,
        inner: AxisEmbedder,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::EmbeddingUnavailable("connection refused".into()));
            }
            self.inner.embed(text).await
        }

        fn dim(&self) -> usize {
            3
        }

        fn model_version(&self) -> &str {
            "axis-v1"
        }
    }

    async fn build_index() -> SharedIndex {
        let entries = vec![
            KnowledgeEntry::new("faq-1", "Our hours are 9am to 5pm."),
            KnowledgeEntry::new("faq-2", "Our refund window is 30 days."),
        ];
        SharedIndex::new(EmbeddingIndex::build(entries, &AxisEmbedder).await.unwrap())
    }

    fn fast_config() -> RetrieverConfig {
        RetrieverConfig {
            backoff_initial: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retrieve_filters_by_min_score() {
        let index = build_index().await;
        let retriever = Retriever::new(Arc::new(AxisEmbedder), index, fast_config());

        let results = retriever.retrieve("what are your hours").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry_id, "faq-1");
    }

    #[tokio::test]
    async fn test_retrieve_empty_query_rejected() {
        let index = build_index().await;
        let retriever = Retriever::new(Arc::new(AxisEmbedder), index, fast_config());

        let err = retriever.retrieve("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_retrieve_recovers_after_transient_failures() {
        let index = build_index().await;
        let embedder = FlakyEmbedder {
            failures: AtomicU32::new(2),
            inner: AxisEmbedder,
        };
        let retriever = Retriever::new(Arc::new(embedder), index, fast_config());

        let results = retriever.retrieve("refund policy").await.unwrap();
        assert_eq!(results[0].entry_id, "faq-2");
    }

    #[tokio::test]
    async fn test_retrieve_gives_up_after_max_attempts() {
        let index = build_index().await;
        let embedder = FlakyEmbedder {
            failures: AtomicU32::new(10),
            inner: AxisEmbedder,
        };
        let retriever = Retriever::new(Arc::new(embedder), index, fast_config());

        let err = retriever.retrieve("refund policy").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_retrieve_empty_index_yields_no_candidates() {
        let index = SharedIndex::new(EmbeddingIndex::empty(3, "axis-v1"));
        let retriever = Retriever::new(Arc::new(AxisEmbedder), index, fast_config());

        let results = retriever.retrieve("anything").await.unwrap();
        assert!(results.is_empty());
    }
}
