//! HTTP Endpoints
//!
//! REST API for session management, knowledge reloads, and health probes.

use std::path::Path as FsPath;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use faq_agent_core::Sender;
use faq_agent_rag::{load_knowledge_file, EmbeddingIndex};

use crate::state::AppState;
use crate::websocket::WebSocketHandler;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );

    Router::new()
        // Session endpoints
        .route("/api/sessions", post(create_session))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id", delete(delete_session))
        // Knowledge base
        .route("/api/knowledge/reload", post(reload_knowledge))
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // WebSocket transcription feed
        .route("/ws/:session_id", get(WebSocketHandler::handle))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000 for safety
/// - Otherwise, uses the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return localhost_cors();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        return localhost_cors();
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(true)
}

fn localhost_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    /// Participant identity, opaque to the server.
    identity: String,
    /// Explicit role; the server never infers it from the identity string.
    #[serde(default = "default_role")]
    role: Sender,
}

fn default_role() -> Sender {
    Sender::User
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: String,
    state: String,
}

/// Create a session
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), StatusCode> {
    let handle = state
        .sessions
        .create(&state.orchestrator, request.identity, request.role)
        .map_err(|e| {
            tracing::warn!("Session creation failed: {}", e);
            StatusCode::from(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: handle.session_id().to_string(),
            state: handle.state().to_string(),
        }),
    ))
}

/// Get session info
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::session::SessionInfo>, StatusCode> {
    let info = state.sessions.info(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(info))
}

/// Delete session
async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.sessions.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// List sessions
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

/// Rebuild the embedding index from the configured knowledge file.
///
/// The active index is replaced only after the rebuild succeeds; a failed
/// reload leaves searches on the previous index.
async fn reload_knowledge(State(state): State<AppState>) -> impl IntoResponse {
    let path = state.settings.server.knowledge_path.clone();

    let result = async {
        let entries = load_knowledge_file(FsPath::new(&path))
            .map_err(|e| ServerError::Reload(e.to_string()))?;
        let count = entries.len();
        let index = EmbeddingIndex::build(entries, state.embedder.as_ref())
            .await
            .map_err(|e| ServerError::Reload(e.to_string()))?;
        state.index.swap(index);
        Ok::<usize, ServerError>(count)
    }
    .await;

    match result {
        Ok(count) => {
            tracing::info!(entries = count, path = %path, "Knowledge base reloaded");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "reloaded",
                    "entries": count,
                })),
            )
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Knowledge reload failed, keeping previous index");
            (
                StatusCode::from(e),
                Json(serde_json::json!({
                    "status": "failed",
                    "error": "knowledge reload failed, previous index still active",
                })),
            )
        }
    }
}

/// Liveness check
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let index = state.index.load();
    Json(serde_json::json!({
        "status": "healthy",
        "sessions": state.sessions.count(),
        "index_entries": index.len(),
        "embedding_model": index.model_version(),
    }))
}

/// Readiness check: probes the generation backend.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let available = tokio::time::timeout(Duration::from_secs(2), state.generator.is_available())
        .await
        .unwrap_or(false);

    if available {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "generation_backend": state.generator.model_name(),
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "error": "generation backend unavailable",
            })),
        )
    }
}
