//! Error types shared across the workspace.

use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
///
/// Per-crate errors (`RagError`, `AgentError`, `ServerError`) convert into
/// this type at crate boundaries. The variants mirror how failures are
/// handled: bad caller input is rejected synchronously, capability outages
/// are retried with backoff, and only session-fatal conditions terminate a
/// conversation.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad caller input (e.g. `k == 0`, dimension mismatch). Never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding capability is unreachable. Transient; retried locally
    /// with bounded exponential backoff.
    #[error("embedding capability unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The generative capability is unreachable or its stream failed.
    /// Transient; retried locally with bounded exponential backoff.
    #[error("generation capability unavailable: {0}")]
    GenerationUnavailable(String),

    /// Idle timeout or transport disconnect. Fatal to the session.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// A knowledge base rebuild failed. The previous index stays active.
    #[error("index rebuild failed: {0}")]
    IndexRebuildFailed(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a bounded local retry is appropriate for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable(_) | Error::GenerationUnavailable(_)
        )
    }

    /// Whether this error terminates the session rather than the turn.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Error::SessionExpired(_))
    }
}
