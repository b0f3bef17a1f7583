//! HTTP client for the relay's endpoints.

use std::future::Future;

use serde_json::json;
use thiserror::Error;

use crate::client::consumer::{ConsumeOutcome, StreamConsumer};
use crate::client::view::{ChatView, ViewError};
use crate::provider::ChatMessage;
use crate::relay::Framing;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error("{status}: {message}")]
    Status { status: u16, message: String },
}

/// Which streaming endpoint a turn goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /api/chat` with a routed model id.
    Chat { model: String },
    /// `POST /api/assistant/stream`, history sent by the client.
    AssistantStream,
    /// `POST /api/assistant/session/{id}`, history kept by the server.
    Session { id: String },
}

impl Endpoint {
    fn path(&self) -> String {
        match self {
            Endpoint::Chat { .. } => "/api/chat".to_string(),
            Endpoint::AssistantStream => "/api/assistant/stream".to_string(),
            Endpoint::Session { id } => format!("/api/assistant/session/{id}"),
        }
    }

    pub fn framing(&self) -> Framing {
        match self {
            Endpoint::Chat { .. } => Framing::Raw,
            Endpoint::AssistantStream | Endpoint::Session { .. } => Framing::EventStream,
        }
    }

    fn body(&self, prompt: &str, history: &[ChatMessage]) -> serde_json::Value {
        match self {
            Endpoint::Chat { model } => json!({
                "providerModelId": model,
                "prompt": prompt,
                "history": history,
            }),
            Endpoint::AssistantStream => json!({ "prompt": prompt, "history": history }),
            Endpoint::Session { .. } => json!({ "prompt": prompt }),
        }
    }
}

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Send one prompt and stream the reply into `view`.
    ///
    /// Fails without touching the view when it cannot accept input. Any
    /// transport or server failure after that lands in the view as
    /// `Errored` and in the returned outcome.
    pub async fn send<C, F>(
        &self,
        endpoint: &Endpoint,
        view: &mut ChatView,
        prompt: &str,
        cancel: C,
        mut on_update: F,
    ) -> Result<ConsumeOutcome, ClientError>
    where
        C: Future<Output = ()>,
        F: FnMut(&ChatView),
    {
        let history = view.begin_turn(prompt)?;
        on_update(view);
        futures::pin_mut!(cancel);

        let request = self
            .http
            .post(format!("{}{}", self.base_url, endpoint.path()))
            .json(&endpoint.body(prompt, &history))
            .send();

        let response = tokio::select! {
            biased;
            _ = &mut cancel => {
                view.cancel();
                on_update(view);
                return Ok(ConsumeOutcome::Cancelled);
            }
            response = request => response,
        };

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let message = if body.is_empty() { status.to_string() } else { body };
                view.fail(message.clone());
                on_update(view);
                return Ok(ConsumeOutcome::Failed(message));
            }
            Err(e) => {
                let message = e.to_string();
                view.fail(message.clone());
                on_update(view);
                return Ok(ConsumeOutcome::Failed(message));
            }
        };

        let outcome = StreamConsumer::new(endpoint.framing())
            .consume(response.bytes_stream(), cancel, view, on_update)
            .await;
        Ok(outcome)
    }

    /// Full history of a server-side session, or `None` if it does not exist.
    pub async fn session_history(&self, id: &str) -> Result<Option<Vec<ChatMessage>>, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/assistant/session/{id}", self.base_url))
            .send()
            .await?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ClientError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Delete a server-side session. Returns whether it existed.
    pub async fn delete_session(&self, id: &str) -> Result<bool, ClientError> {
        let response = self
            .http
            .delete(format!("{}/api/assistant/session/{id}", self.base_url))
            .send()
            .await?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(ClientError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
