//! Knowledge base entry and retrieval result types.

use serde::{Deserialize, Serialize};

/// One answerable entry in the knowledge base.
///
/// Immutable: entries are created at index-build time and replaced only by a
/// full rebuild, never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique ID within the knowledge base.
    pub id: String,
    /// Entry text supplied to the generative capability as grounding.
    pub text: String,
    /// Optional tags (e.g. "faq", "policy").
    #[serde(default)]
    pub tags: Vec<String>,
}

impl KnowledgeEntry {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// One scored candidate from a similarity search.
///
/// Sequences of these are ordered highest score first; scores are cosine
/// similarity clamped to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    /// ID of the matched [`KnowledgeEntry`].
    pub entry_id: String,
    /// Matched entry text, carried so callers need no second lookup.
    pub text: String,
    /// Similarity score in [0, 1].
    pub score: f32,
}
