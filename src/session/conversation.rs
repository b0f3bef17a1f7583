//! Conversation handle bound to a provider.
//!
//! The handle owns the turn history. A prompt is sent together with the
//! history so far; the user turn and the model's reply are appended only
//! after the reply stream completes with non-empty text. Turns on one
//! conversation are serialized.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::provider::{ChatMessage, ChatProvider, FragmentStream, ProviderError, ProviderRequest};

#[derive(Clone)]
pub struct Conversation {
    provider: Arc<dyn ChatProvider>,
    model: String,
    history: Arc<Mutex<Vec<ChatMessage>>>,
    /// Held for the lifetime of an in-flight reply.
    turn: Arc<Mutex<()>>,
}

impl Conversation {
    /// Start a conversation with empty history.
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            history: Arc::new(Mutex::new(Vec::new())),
            turn: Arc::new(Mutex::new(())),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Snapshot of the committed turns, oldest first.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    /// Send a prompt and stream the reply.
    ///
    /// Waits for any in-flight turn to finish first. Dropping the returned
    /// stream before it ends leaves the history untouched.
    pub async fn send_message_stream(&self, prompt: String) -> Result<FragmentStream, ProviderError> {
        let turn = self.turn.clone().lock_owned().await;

        let request = ProviderRequest {
            model: self.model.clone(),
            prompt: prompt.clone(),
            history: self.history().await,
        };
        let mut upstream = self.provider.stream_chat(request).await?;
        let history = self.history.clone();

        Ok(Box::pin(async_stream::stream! {
            let _turn = turn;
            let mut reply = String::new();

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(fragment) => {
                        reply.push_str(&fragment);
                        yield Ok(fragment);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if reply.trim().is_empty() {
                debug!("Empty reply, history unchanged");
                return;
            }
            let mut history = history.lock().await;
            history.push(ChatMessage::user(prompt));
            history.push(ChatMessage::model(reply));
        }))
    }
}
