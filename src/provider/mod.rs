//! Provider client adapters.
//!
//! Every upstream API is reached through [`ChatProvider`], which turns a
//! uniform `{model, prompt, history}` request into the backend's call shape
//! and hands back a [`FragmentStream`] of text in emission order.
//!
//! - [`openai`]: OpenAI-compatible `/chat/completions` endpoints
//! - [`gemini`]: Google Gemini `generateContent` / `streamGenerateContent`
//! - [`routing`]: explicit model-id → provider routing with fallback families

pub mod gemini;
mod http;
pub mod openai;
pub mod routing;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::{ProviderConfig, ProviderKind};

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use routing::{Route, RoutingTable};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("Malformed provider payload: {0}")]
    Decode(String),

    #[error("No models configured for {0}")]
    NoModels(String),
}

/// Speaker of a chat turn, as the client names it.
///
/// Deserializes leniently: `"user"` is the user, any other role
/// (`"model"`, `"assistant"`, ...) is the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    User,
    Model,
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        if role == "user" {
            Role::User
        } else {
            Role::Model
        }
    }
}

/// One turn of chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: text.into(),
        }
    }
}

/// A request in provider-neutral form.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Backend model identifier.
    pub model: String,
    /// The new user turn.
    pub prompt: String,
    /// Prior turns, oldest first.
    pub history: Vec<ChatMessage>,
}

/// Lazy, finite, non-restartable sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Uniform interface over chat-completion backends.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name from the configuration, used in logs.
    fn name(&self) -> &str;

    /// Issue a streaming completion. Resolves once the provider has accepted
    /// the call; fragments are then pulled from the returned stream.
    async fn stream_chat(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError>;

    /// Single-shot, non-streaming completion of a bare prompt.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Where an API key comes from.
#[derive(Debug, Clone)]
pub enum ApiKey {
    /// Read from this environment variable on every call.
    Env(String),
    /// Fixed value.
    Static(String),
}

impl ApiKey {
    /// Resolve the key. Missing keys fail the call, not startup.
    pub fn resolve(&self) -> Result<String, ProviderError> {
        match self {
            ApiKey::Env(var) => std::env::var(var)
                .ok()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| ProviderError::MissingApiKey(var.clone())),
            ApiKey::Static(key) if key.is_empty() => {
                Err(ProviderError::MissingApiKey("<static>".to_string()))
            }
            ApiKey::Static(key) => Ok(key.clone()),
        }
    }
}

/// Build a provider from its configuration entry.
pub fn build_provider(
    name: &str,
    config: &ProviderConfig,
    client: reqwest::Client,
) -> Arc<dyn ChatProvider> {
    let key = ApiKey::Env(config.api_key_env.clone());
    let base_url = config.resolve_base_url();
    match config.kind {
        ProviderKind::OpenAiCompatible => Arc::new(OpenAiProvider::new(
            name,
            client,
            base_url,
            key,
            config.timeout(),
        )),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(
            name,
            client,
            base_url,
            key,
            config.timeout(),
        )),
    }
}

/// Open a stream against each model of a family in turn.
///
/// Stops at the first model the provider accepts and returns it with its
/// stream. When every model fails, the last error is returned.
pub async fn stream_with_fallback(
    provider: &dyn ChatProvider,
    models: &[String],
    prompt: &str,
    history: &[ChatMessage],
) -> Result<(String, FragmentStream), ProviderError> {
    let mut last_error = None;

    for model in models {
        let request = ProviderRequest {
            model: model.clone(),
            prompt: prompt.to_string(),
            history: history.to_vec(),
        };
        match provider.stream_chat(request).await {
            Ok(stream) => return Ok((model.clone(), stream)),
            Err(e) => {
                warn!(provider = provider.name(), model = %model, error = %e, "Model attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::NoModels(provider.name().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use futures::StreamExt;

    /// Fails every model except the ones listed.
    struct Picky {
        accepts: Vec<&'static str>,
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatProvider for Picky {
        fn name(&self) -> &str {
            "picky"
        }

        async fn stream_chat(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
            self.attempts.lock().unwrap().push(request.model.clone());
            if self.accepts.contains(&request.model.as_str()) {
                let fragments = vec![Ok(request.model)];
                Ok(Box::pin(futures::stream::iter(fragments)))
            } else {
                Err(ProviderError::Api {
                    status: 404,
                    message: format!("no such model {}", request.model),
                })
            }
        }

        async fn complete(&self, model: &str, _prompt: &str) -> Result<String, ProviderError> {
            Ok(model.to_string())
        }
    }

    fn family(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fallback_uses_last_variant() {
        let provider = Picky {
            accepts: vec!["c"],
            attempts: Mutex::new(Vec::new()),
        };
        let (model, mut stream) = stream_with_fallback(&provider, &family(&["a", "b", "c"]), "hi", &[])
            .await
            .unwrap();
        assert_eq!(model, "c");
        assert_eq!(stream.next().await.unwrap().unwrap(), "c");
        assert_eq!(*provider.attempts.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_success() {
        let provider = Picky {
            accepts: vec!["a", "b"],
            attempts: Mutex::new(Vec::new()),
        };
        let (model, _) = stream_with_fallback(&provider, &family(&["a", "b"]), "hi", &[])
            .await
            .unwrap();
        assert_eq!(model, "a");
        assert_eq!(provider.attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_surfaces_last_error() {
        let provider = Picky {
            accepts: vec![],
            attempts: Mutex::new(Vec::new()),
        };
        let err = stream_with_fallback(&provider, &family(&["a", "b"]), "hi", &[])
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "no such model b");
    }

    #[tokio::test]
    async fn test_empty_family() {
        let provider = Picky {
            accepts: vec![],
            attempts: Mutex::new(Vec::new()),
        };
        let err = stream_with_fallback(&provider, &[], "hi", &[]).await.err().unwrap();
        assert!(matches!(err, ProviderError::NoModels(_)));
    }

    #[test]
    fn test_chat_message_wire_format() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"model","parts":"hey"}"#).unwrap();
        assert_eq!(msg, ChatMessage::model("hey"));
        assert_eq!(
            serde_json::to_string(&ChatMessage::user("hi")).unwrap(),
            r#"{"role":"user","parts":"hi"}"#
        );
    }

    #[test]
    fn test_any_non_user_role_is_model() {
        let history: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role":"user","parts":"a"},{"role":"assistant","parts":"b"},{"role":"system","parts":"c"}]"#,
        )
        .unwrap();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::Model]);
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), r#""model""#);
    }

    #[test]
    fn test_static_key() {
        assert_eq!(ApiKey::Static("k".into()).resolve().unwrap(), "k");
        assert!(matches!(
            ApiKey::Env("CHAT_RELAY_TEST_NO_SUCH_KEY".into()).resolve(),
            Err(ProviderError::MissingApiKey(_))
        ));
    }
}
