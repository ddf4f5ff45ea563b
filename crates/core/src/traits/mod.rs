//! Capability traits
//!
//! The embedding and generation capabilities are pluggable so that the
//! engine can run against a local deterministic backend, an HTTP model
//! server, or a test double without code changes.

mod embedder;
mod generation;

pub use embedder::Embedder;
pub use generation::GenerativeModel;
