//! Stateful chat sessions keyed by a client-chosen id.
//!
//! - [`conversation`]: the provider-side conversation handle and its history
//! - [`store`]: the [`SessionStore`] registry and its in-memory implementation

pub mod conversation;
pub mod store;

use std::sync::Arc;

pub use conversation::Conversation;
pub use store::{InMemorySessionStore, SessionStore};

/// A registered session. Lives until deleted or the process exits.
pub struct ChatSession {
    pub id: String,
    pub conversation: Conversation,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, conversation: Conversation) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            conversation,
        })
    }
}
