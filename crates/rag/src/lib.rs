//! Retrieval for the FAQ voice agent
//!
//! Features:
//! - In-process embedding index with cosine similarity search
//! - Atomic index swap for zero-downtime knowledge reloads
//! - Deterministic hash embedder plus an HTTP embedding backend
//! - Retriever with bounded retry and score filtering
//! - Knowledge base loading (Question:/Answer: text, YAML, JSON)

pub mod embedder;
pub mod index;
pub mod knowledge;
pub mod retriever;

pub use embedder::{HashEmbedder, HttpEmbedder};
pub use index::{EmbeddingIndex, SharedIndex};
pub use knowledge::{
    load_knowledge_file, parse_qa_text, sample_knowledge, write_sample_knowledge, KnowledgeFile,
};
pub use retriever::{Retriever, RetrieverConfig};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Knowledge load error: {0}")]
    Knowledge(String),
}

impl From<RagError> for faq_agent_core::Error {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Embedding(msg) => faq_agent_core::Error::EmbeddingUnavailable(msg),
            RagError::InvalidArgument(msg) => faq_agent_core::Error::InvalidArgument(msg),
            RagError::Index(msg) => faq_agent_core::Error::IndexRebuildFailed(msg),
            RagError::Knowledge(msg) => faq_agent_core::Error::IndexRebuildFailed(msg),
        }
    }
}
