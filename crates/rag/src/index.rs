//! In-process embedding index
//!
//! Holds every knowledge entry with its embedding vector and answers
//! similarity queries by brute-force cosine scan. Knowledge bases here are
//! hundreds of entries, not millions; a scan beats any approximate
//! structure at this scale and keeps results exact.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use faq_agent_core::{Embedder, Error, KnowledgeEntry, Result, ScoredEntry};

use crate::RagError;

/// Immutable embedding index over a fixed set of knowledge entries.
///
/// Built once from a knowledge base snapshot; reload replaces the whole
/// index rather than mutating it. Entry order is insertion order, which
/// makes tie-breaking in [`search`](Self::search) deterministic.
pub struct EmbeddingIndex {
    entries: Vec<KnowledgeEntry>,
    vectors: Vec<Vec<f32>>,
    dim: usize,
    model_version: String,
}

impl EmbeddingIndex {
    /// Build an index by embedding every entry.
    ///
    /// Fails as a whole if any entry fails to embed; a partial index is
    /// never produced.
    pub async fn build(
        entries: Vec<KnowledgeEntry>,
        embedder: &dyn Embedder,
    ) -> Result<Self> {
        let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        let dim = embedder.dim();
        for (entry, vector) in entries.iter().zip(&vectors) {
            if vector.len() != dim {
                return Err(RagError::Index(format!(
                    "entry {} embedded to {} dims, expected {}",
                    entry.id,
                    vector.len(),
                    dim
                ))
                .into());
            }
        }

        info!(
            entries = entries.len(),
            dim,
            model = %embedder.model_version(),
            "Embedding index built"
        );

        Ok(Self {
            entries,
            vectors,
            dim,
            model_version: embedder.model_version().to_string(),
        })
    }

    /// Create an empty index. Searches return no candidates.
    pub fn empty(dim: usize, model_version: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            vectors: Vec::new(),
            dim,
            model_version: model_version.into(),
        }
    }

    /// Search for the `k` nearest entries by cosine similarity.
    ///
    /// Scores are clamped to [0, 1]. Results are ordered highest score
    /// first; equal scores keep knowledge base insertion order. An empty
    /// index yields an empty result, `k == 0` and dimension mismatches
    /// are rejected.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        if k == 0 {
            return Err(Error::InvalidArgument("search k must be at least 1".into()));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::InvalidArgument(format!(
                "query has {} dims, index expects {}",
                query.len(),
                self.dim
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v).clamp(0.0, 1.0)))
            .collect();

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredEntry {
                entry_id: self.entries[i].id.clone(),
                text: self.entries[i].text.clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embedder version the index was built with.
    pub fn model_version(&self) -> &str {
        &self.model_version
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Shared handle over the active index.
///
/// Rebuilds swap the `Arc` atomically: in-flight searches keep the index
/// they started with, new searches see the replacement. A failed rebuild
/// never touches the active index.
#[derive(Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<Arc<EmbeddingIndex>>>,
}

impl SharedIndex {
    pub fn new(index: EmbeddingIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// Snapshot of the currently active index.
    pub fn load(&self) -> Arc<EmbeddingIndex> {
        self.inner.read().clone()
    }

    /// Replace the active index.
    pub fn swap(&self, index: EmbeddingIndex) {
        let next = Arc::new(index);
        info!(entries = next.len(), "Swapping active embedding index");
        *self.inner.write() = next;
    }
}
