//! Chat view state machine.
//!
//! The view holds committed messages plus one in-progress slot for the reply
//! being streamed. Each update replaces the slot wholesale; the slot is
//! committed when the stream ends.
//!
//! ```text
//!   Idle ──begin_turn──▶ Streaming ──finish──▶ Idle
//!                           │
//!                           ├──cancel──▶ Cancelled ──clear──▶ Idle
//!                           └──fail────▶ Errored   ──clear──▶ Idle
//! ```

use thiserror::Error;

use crate::provider::{ChatMessage, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// Ready for the next prompt.
    Idle,
    /// A reply is being received.
    Streaming,
    /// The user aborted the reply. Input stays blocked until cleared.
    Cancelled,
    /// The reply failed. Input stays blocked until cleared.
    Errored(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ViewError {
    #[error("a reply is still streaming")]
    Busy,

    #[error("input is blocked until the history is cleared")]
    Blocked,
}

#[derive(Debug, Clone)]
pub struct ChatView {
    messages: Vec<ChatMessage>,
    in_progress: Option<String>,
    state: ViewState,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView {
    pub fn new() -> Self {
        Self::with_history(Vec::new())
    }

    /// Resume from previously stored messages.
    pub fn with_history(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            in_progress: None,
            state: ViewState::Idle,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn can_send(&self) -> bool {
        self.state == ViewState::Idle
    }

    /// Committed messages only.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Text of the in-progress reply, if any has arrived.
    pub fn in_progress(&self) -> Option<&str> {
        self.in_progress.as_deref()
    }

    /// What the user sees: committed messages followed by the partial reply.
    pub fn visible(&self) -> Vec<ChatMessage> {
        let mut out = self.messages.clone();
        if let Some(text) = &self.in_progress {
            out.push(ChatMessage::model(text.clone()));
        }
        out
    }

    /// Record the user's prompt and enter `Streaming`.
    ///
    /// Returns the history to send with the request: every committed message
    /// before this prompt.
    pub fn begin_turn(&mut self, prompt: impl Into<String>) -> Result<Vec<ChatMessage>, ViewError> {
        match self.state {
            ViewState::Idle => {}
            ViewState::Streaming => return Err(ViewError::Busy),
            ViewState::Cancelled | ViewState::Errored(_) => return Err(ViewError::Blocked),
        }

        let history = self.messages.clone();
        self.messages.push(ChatMessage::user(prompt));
        self.in_progress = None;
        self.state = ViewState::Streaming;
        Ok(history)
    }

    /// Replace the partial reply with the cumulative text so far.
    pub fn update(&mut self, text: &str) {
        if self.state != ViewState::Streaming {
            return;
        }
        self.in_progress = Some(text.to_string());
    }

    /// The stream ended: commit the partial reply.
    pub fn finish(&mut self) {
        if self.state != ViewState::Streaming {
            return;
        }
        if let Some(text) = self.in_progress.take() {
            self.messages.push(ChatMessage::model(text));
        }
        self.state = ViewState::Idle;
    }

    /// The user aborted. The partial reply stays visible.
    pub fn cancel(&mut self) {
        if self.state == ViewState::Streaming {
            self.state = ViewState::Cancelled;
        }
    }

    /// The reply failed. The partial reply stays visible.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.state == ViewState::Streaming {
            self.state = ViewState::Errored(message.into());
        }
    }

    /// Drop all messages and return to `Idle`.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.in_progress = None;
        self.state = ViewState::Idle;
    }

    /// Number of committed turns with the given role.
    pub fn count(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_lifecycle() {
        let mut view = ChatView::new();
        let history = view.begin_turn("hi").unwrap();
        assert!(history.is_empty());
        assert_eq!(view.state(), &ViewState::Streaming);

        view.update("He");
        view.update("Hello");
        assert_eq!(view.visible().len(), 2);
        assert_eq!(view.in_progress(), Some("Hello"));

        view.finish();
        assert_eq!(view.state(), &ViewState::Idle);
        assert_eq!(view.messages(), &[ChatMessage::user("hi"), ChatMessage::model("Hello")]);
        assert_eq!(view.in_progress(), None);

        let history = view.begin_turn("again").unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_updates_replace_slot() {
        let mut view = ChatView::new();
        view.begin_turn("hi").unwrap();
        for text in ["H", "He", "Hel"] {
            view.update(text);
        }
        let visible = view.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[1].parts, "Hel");
    }

    #[test]
    fn test_cancel_blocks_until_clear() {
        let mut view = ChatView::new();
        view.begin_turn("hi").unwrap();
        view.update("Par");
        view.cancel();

        assert_eq!(view.state(), &ViewState::Cancelled);
        assert_eq!(view.in_progress(), Some("Par"));
        assert_eq!(view.begin_turn("more"), Err(ViewError::Blocked));

        view.update("Partial");
        assert_eq!(view.in_progress(), Some("Par"));

        view.clear();
        assert!(view.can_send());
        assert!(view.visible().is_empty());
    }

    #[test]
    fn test_error_blocks_until_clear() {
        let mut view = ChatView::new();
        view.begin_turn("hi").unwrap();
        view.fail("Empty response");
        assert_eq!(view.state(), &ViewState::Errored("Empty response".to_string()));
        assert_eq!(view.begin_turn("x"), Err(ViewError::Blocked));
    }

    #[test]
    fn test_busy_while_streaming() {
        let mut view = ChatView::new();
        view.begin_turn("hi").unwrap();
        assert_eq!(view.begin_turn("again"), Err(ViewError::Busy));
    }

    #[test]
    fn test_finish_without_output_commits_nothing() {
        let mut view = ChatView::new();
        view.begin_turn("hi").unwrap();
        view.finish();
        assert_eq!(view.count(Role::User), 1);
        assert_eq!(view.count(Role::Model), 0);
    }
}
