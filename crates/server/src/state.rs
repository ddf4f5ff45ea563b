//! Shared application state

use std::sync::Arc;

use faq_agent_agent::Orchestrator;
use faq_agent_config::Settings;
use faq_agent_core::{Embedder, GenerativeModel};
use faq_agent_rag::SharedIndex;

use crate::session::SessionManager;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub sessions: Arc<SessionManager>,
    pub orchestrator: Arc<Orchestrator>,
    /// Active embedding index; swapped atomically on knowledge reload.
    pub index: SharedIndex,
    pub embedder: Arc<dyn Embedder>,
    /// Kept for the readiness probe.
    pub generator: Arc<dyn GenerativeModel>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        orchestrator: Orchestrator,
        index: SharedIndex,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn GenerativeModel>,
    ) -> Self {
        let max_sessions = settings.server.max_sessions;
        Self {
            settings: Arc::new(settings),
            sessions: Arc::new(SessionManager::new(max_sessions)),
            orchestrator: Arc::new(orchestrator),
            index,
            embedder,
            generator,
        }
    }
}
