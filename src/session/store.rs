//! Session registry.
//!
//! Handlers receive the registry as `Arc<dyn SessionStore>`, so the
//! in-memory map can be replaced without touching call sites.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::provider::ChatProvider;
use crate::session::{ChatSession, Conversation};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the session for `id`, creating it with empty history if absent.
    async fn create_or_get(&self, id: &str) -> Arc<ChatSession>;

    /// Look up a session.
    async fn get(&self, id: &str) -> Option<Arc<ChatSession>>;

    /// Remove a session, returning it if it existed.
    async fn remove(&self, id: &str) -> Option<Arc<ChatSession>>;

    /// Number of live sessions.
    async fn len(&self) -> usize;
}

/// Process-lifetime session map. New sessions talk to one provider/model.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<ChatSession>>>,
    provider: Arc<dyn ChatProvider>,
    model: String,
}

impl InMemorySessionStore {
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_or_get(&self, id: &str) -> Arc<ChatSession> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }

        // Re-check under the write lock: a concurrent creator may have won.
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(session = id, model = %self.model, "Session created");
                ChatSession::new(id, Conversation::new(self.provider.clone(), self.model.clone()))
            })
            .clone()
    }

    async fn get(&self, id: &str) -> Option<Arc<ChatSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn remove(&self, id: &str) -> Option<Arc<ChatSession>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            info!(session = id, "Session deleted");
        }
        removed
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
