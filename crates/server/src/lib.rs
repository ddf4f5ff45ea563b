//! FAQ Voice Agent Server
//!
//! HTTP and WebSocket endpoints over the session orchestrator.

pub mod http;
pub mod session;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use session::{SessionInfo, SessionManager};
pub use state::AppState;
pub use websocket::WebSocketHandler;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session capacity reached ({0} sessions)")]
    CapacityExceeded(usize),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Knowledge reload failed: {0}")]
    Reload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::SessionNotFound(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::CapacityExceeded(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Reload(_) => axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServerError> for faq_agent_core::Error {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::SessionNotFound(msg) => faq_agent_core::Error::SessionExpired(msg),
            ServerError::InvalidRequest(msg) => faq_agent_core::Error::InvalidArgument(msg),
            ServerError::Reload(msg) => faq_agent_core::Error::IndexRebuildFailed(msg),
            other => faq_agent_core::Error::Internal(other.to_string()),
        }
    }
}
