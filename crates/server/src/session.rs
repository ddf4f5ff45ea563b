//! Session registry
//!
//! Maps session IDs to live orchestrator handles. The orchestrator owns
//! each session's lifecycle; the registry only hands out handles and
//! reclaims slots once a session has reached `Closed`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use faq_agent_agent::{Orchestrator, SessionHandle};
use faq_agent_core::{Sender, TurnState};

use crate::ServerError;

/// Serializable snapshot of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    /// Participant identity, opaque to the server.
    pub identity: String,
    /// Explicit role declared at join time; never inferred from the
    /// identity string.
    pub role: Sender,
    pub state: TurnState,
    pub created_at: DateTime<Utc>,
    pub subscribers: usize,
}

struct SessionEntry {
    handle: SessionHandle,
    identity: String,
    role: Sender,
    created_at: DateTime<Utc>,
}

impl SessionEntry {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.handle.session_id().to_string(),
            identity: self.identity.clone(),
            role: self.role,
            state: self.handle.state(),
            created_at: self.created_at,
            subscribers: self.handle.subscriber_count(),
        }
    }
}

/// In-memory registry of live sessions.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Create a session, spawning its orchestrator loop.
    ///
    /// Closed sessions are reclaimed first, so capacity counts only live
    /// sessions.
    pub fn create(
        &self,
        orchestrator: &Orchestrator,
        identity: impl Into<String>,
        role: Sender,
    ) -> Result<SessionHandle, ServerError> {
        let mut sessions = self.sessions.write();
        sessions.retain(|_, entry| entry.handle.state() != TurnState::Closed);

        if sessions.len() >= self.max_sessions {
            return Err(ServerError::CapacityExceeded(self.max_sessions));
        }

        let session_id = Uuid::new_v4().to_string();
        let handle = orchestrator.spawn_session(session_id.clone());
        sessions.insert(
            session_id,
            SessionEntry {
                handle: handle.clone(),
                identity: identity.into(),
                role,
                created_at: Utc::now(),
            },
        );
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(id).map(|e| e.handle.clone())
    }

    pub fn info(&self, id: &str) -> Option<SessionInfo> {
        self.sessions.read().get(id).map(SessionEntry::info)
    }

    /// Remove a session, closing it immediately.
    ///
    /// WebSocket-held handle clones observe the `Closed` state and
    /// disconnect on their own.
    pub fn remove(&self, id: &str) -> bool {
        match self.sessions.write().remove(id) {
            Some(entry) => {
                entry.handle.close();
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions.read().values().map(SessionEntry::info).collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use faq_agent_agent::{Composer, ComposerSettings, OrchestratorConfig};
    use faq_agent_core::{
        Embedder, Error, GenerateRequest, GenerativeModel, Result, StreamChunk,
    };
    use faq_agent_rag::{EmbeddingIndex, Retriever, RetrieverConfig, SharedIndex};
    use futures::Stream;
    use std::pin::Pin;

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dim(&self) -> usize {
            2
        }

        fn model_version(&self) -> &str {
            "null-v1"
        }
    }

    struct NullModel;

    #[async_trait]
    impl GenerativeModel for NullModel {
        fn generate_stream<'a>(
            &'a self,
            _request: GenerateRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
            Box::pin(futures::stream::iter(vec![Err(
                Error::GenerationUnavailable("test".into()),
            )]))
        }

        async fn is_available(&self) -> bool {
            false
        }

        fn model_name(&self) -> &str {
            "null"
        }
    }

    fn orchestrator() -> Orchestrator {
        let index = SharedIndex::new(EmbeddingIndex::empty(2, "null-v1"));
        let retriever = Retriever::new(
            Arc::new(NullEmbedder),
            index,
            RetrieverConfig::default(),
        );
        Orchestrator::new(
            Arc::new(retriever),
            Composer::new(ComposerSettings::default()),
            Arc::new(NullModel),
            OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let manager = SessionManager::new(4);
        let orch = orchestrator();

        let handle = manager.create(&orch, "caller-1", Sender::User).unwrap();
        let id = handle.session_id().to_string();

        assert!(manager.get(&id).is_some());
        assert_eq!(manager.count(), 1);
        assert!(manager.remove(&id));
        assert!(manager.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let manager = SessionManager::new(2);
        let orch = orchestrator();

        manager.create(&orch, "a", Sender::User).unwrap();
        manager.create(&orch, "b", Sender::User).unwrap();
        let err = manager.create(&orch, "c", Sender::User).unwrap_err();
        assert!(matches!(err, ServerError::CapacityExceeded(2)));
    }

    #[tokio::test]
    async fn test_remove_closes_session() {
        let manager = SessionManager::new(4);
        let orch = orchestrator();

        let handle = manager.create(&orch, "caller-1", Sender::User).unwrap();
        let id = handle.session_id().to_string();
        let mut state = handle.watch_state();

        assert!(manager.remove(&id));

        // The retained handle clone sees the session close.
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while *state.borrow() != TurnState::Closed {
                state.changed().await.unwrap();
            }
        })
        .await
        .expect("session did not close on remove");
    }

    #[tokio::test]
    async fn test_list_reports_identity_and_state() {
        let manager = SessionManager::new(4);
        let orch = orchestrator();
        manager.create(&orch, "caller-1", Sender::User).unwrap();

        let infos = manager.list();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].identity, "caller-1");
        assert_eq!(infos[0].role, Sender::User);
        assert_ne!(infos[0].state, TurnState::Closed);
    }
}
