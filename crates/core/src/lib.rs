//! Core traits and types for the FAQ voice agent
//!
//! This crate provides foundational types used across all other crates:
//! - Knowledge base entries and retrieval result types
//! - Utterance and transcript event types
//! - Generation request/stream types
//! - Capability traits for pluggable backends (embedding, generation)
//! - Error types

pub mod error;
pub mod generation;
pub mod knowledge;
pub mod session;
pub mod traits;
pub mod transcript;

pub use error::{Error, Result};
pub use generation::{FinishReason, GenerateRequest, Message, Role, StreamChunk};
pub use knowledge::{KnowledgeEntry, ScoredEntry};
pub use session::TurnState;
pub use transcript::{Sender, TranscriptEvent, Utterance};

pub use traits::{Embedder, GenerativeModel};
