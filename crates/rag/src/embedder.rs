//! Embedding backends
//!
//! `HashEmbedder` needs no model files and is fully deterministic, which
//! makes it the default for development and tests. `HttpEmbedder` talks to
//! a remote embedding server for real deployments.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use faq_agent_core::{Embedder, Result};

use crate::RagError;

const HASH_MODEL_VERSION: &str = "hash-v1";

/// Deterministic token-hash embedder.
///
/// Lowercases, splits on non-alphanumeric boundaries, and hashes each token
/// into a fixed-dimension bag-of-words vector, L2-normalized. The same text
/// always produces the same vector, so index builds and query embeddings
/// agree without any shared state.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vector[idx] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_version(&self) -> &str {
        HASH_MODEL_VERSION
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Serialize)]
struct EmbedBatchRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding backend over HTTP.
///
/// POSTs `{"input": ...}` and expects `{"embeddings": [[...], ...]}`.
/// Transport and decode failures surface as `EmbeddingUnavailable` so the
/// retriever retries them.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    dim: usize,
    model_version: String,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, dim: usize, model_version: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            dim,
            model_version: model_version.into(),
        }
    }

    async fn post_embeddings<B: Serialize>(&self, body: &B) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Embedding(format!(
                "embedding server returned {}",
                response.status()
            ))
            .into());
        }

        let decoded: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid response: {}", e)))?;

        for vector in &decoded.embeddings {
            if vector.len() != self.dim {
                return Err(RagError::Embedding(format!(
                    "server returned {} dims, expected {}",
                    vector.len(),
                    self.dim
                ))
                .into());
            }
        }

        Ok(decoded.embeddings)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.post_embeddings(&EmbedRequest { input: text }).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("server returned no embeddings".into()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self
            .post_embeddings(&EmbedBatchRequest { input: texts })
            .await?;
        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "server returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            ))
            .into());
        }
        Ok(vectors)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("What are your business hours?").await.unwrap();
        let b = embedder.embed("What are your business hours?").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hash_embedder_normalized() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("Hello world").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_hash_embedder_token_overlap_scores_higher() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed("what are your business hours").await.unwrap();
        let related = embedder
            .embed("Q: What are your business hours? A: We are open 9 to 6.")
            .await
            .unwrap();
        let unrelated = embedder
            .embed("Q: Do you ship worldwide? A: Yes, via courier.")
            .await
            .unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_hash_embedder_empty_text() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("").await.unwrap();
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_hash_embedder_case_insensitive() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Business Hours").await.unwrap();
        let b = embedder.embed("business hours").await.unwrap();
        assert_eq!(a, b);
    }
}
