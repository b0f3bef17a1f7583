//! OpenAI-compatible chat completions adapter.
//!
//! Works against any endpoint implementing `POST {base}/chat/completions`
//! (OpenAI, DeepSeek, proxy gateways). Streaming responses are SSE events
//! carrying `choices[0].delta.content`, terminated by `data: [DONE]`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::http::{send, sse_fragments};
use crate::provider::{
    ApiKey, ChatMessage, ChatProvider, FragmentStream, ProviderError, ProviderRequest, Role,
};

pub struct OpenAiProvider {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamedError {
    error: StreamedErrorBody,
}

#[derive(Debug, Deserialize)]
struct StreamedErrorBody {
    message: String,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "assistant",
    }
}

/// History plus the new prompt as the final user turn.
fn wire_messages<'a>(history: &'a [ChatMessage], prompt: &'a str) -> Vec<WireMessage<'a>> {
    history
        .iter()
        .map(|m| WireMessage {
            role: wire_role(m.role),
            content: &m.parts,
        })
        .chain(std::iter::once(WireMessage {
            role: "user",
            content: prompt,
        }))
        .collect()
}

/// Parse one SSE payload: `[DONE]` and empty deltas yield nothing.
fn parse_event(data: &str) -> Result<Option<String>, ProviderError> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    if let Ok(err) = serde_json::from_str::<StreamedError>(data) {
        return Err(ProviderError::Api {
            status: 200,
            message: err.error.message,
        });
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| ProviderError::Decode(e.to_string()))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty()))
}

impl OpenAiProvider {
    pub fn new(
        name: impl Into<String>,
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: ApiKey,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    async fn post(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        let key = self.api_key.resolve()?;
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(body);
        send(request, self.timeout).await
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
        debug!(
            provider = %self.name,
            model = %request.model,
            history = request.history.len(),
            "Opening chat completion stream"
        );

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: wire_messages(&request.history, &request.prompt),
            stream: true,
        };
        let response = self.post(&body).await?;
        Ok(sse_fragments(response, parse_event))
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatCompletionRequest {
            model,
            messages: wire_messages(&[], prompt),
            stream: false,
        };
        let response: ChatCompletionResponse = self.post(&body).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::Decode("response has no choices".to_string()))
    }
}
