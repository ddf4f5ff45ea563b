//! Embedding capability trait

use async_trait::async_trait;

use crate::Result;

/// Text embedding interface
///
/// Implementations:
/// - `HashEmbedder` - deterministic in-process token-hash embedding
/// - `HttpEmbedder` - remote embedding model over HTTP
///
/// Embedding must be deterministic for a given model version: the same
/// text always maps to the same vector, which is what makes index
/// lookups and the determinism guarantees of retrieval hold.
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Embed a single text into a fixed-dimension vector.
    ///
    /// Returned vectors are L2-normalized so that a dot product is a
    /// cosine similarity. Fails with `EmbeddingUnavailable` when the
    /// backend is unreachable.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, in order.
    ///
    /// The default implementation embeds sequentially; backends with a
    /// batch endpoint should override.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Vector dimension produced by this embedder.
    fn dim(&self) -> usize;

    /// Model version string, recorded at index build time.
    ///
    /// An index built with one version must not be searched with vectors
    /// from another.
    fn model_version(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        fn dim(&self) -> usize {
            3
        }

        fn model_version(&self) -> &str {
            "fixed-v1"
        }
    }

    #[tokio::test]
    async fn test_default_batch_preserves_order() {
        let embedder = FixedEmbedder;
        let texts = vec!["a".to_string(), "b".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), embedder.dim());
    }
}
