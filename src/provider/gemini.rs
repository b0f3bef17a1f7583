//! Google Gemini adapter.
//!
//! Streaming uses `models/{model}:streamGenerateContent?alt=sse`, single-shot
//! uses `models/{model}:generateContent`. Every request disables the four
//! harm-category filters (`BLOCK_NONE`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::http::{send, sse_fragments};
use crate::provider::{
    ApiKey, ChatMessage, ChatProvider, FragmentStream, ProviderError, ProviderRequest, Role,
};

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiProvider {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
    timeout: Duration,
}

// ─── Wire Types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, or the block reason as an error.
    fn into_text(self) -> Result<String, ProviderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::Blocked(reason));
        }
        Ok(self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

// ─── Request Building ──────────────────────────────────────────────────────

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

fn build_request<'a>(history: &'a [ChatMessage], prompt: &'a str) -> GenerateContentRequest<'a> {
    let contents = history
        .iter()
        .map(|m| Content {
            role: wire_role(m.role),
            parts: vec![Part { text: &m.parts }],
        })
        .chain(std::iter::once(Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }))
        .collect();

    GenerateContentRequest {
        contents,
        safety_settings: HARM_CATEGORIES
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: "BLOCK_NONE",
            })
            .collect(),
    }
}

fn parse_event(data: &str) -> Result<Option<String>, ProviderError> {
    let response: GenerateContentResponse =
        serde_json::from_str(data).map_err(|e| ProviderError::Decode(e.to_string()))?;
    let text = response.into_text()?;
    Ok((!text.is_empty()).then_some(text))
}

impl GeminiProvider {
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

    async fn post(
        &self,
        model: &str,
        method: &str,
        sse: bool,
        body: &GenerateContentRequest<'_>,
    ) -> Result<reqwest::Response, ProviderError> {
        let key = self.api_key.resolve()?;
        let mut query = vec![("key", key)];
        if sse {
            query.push(("alt", "sse".to_string()));
        }
        let request = self
            .client
            .post(format!("{}/models/{}:{}", self.base_url, model, method))
            .query(&query)
            .json(body);
        send(request, self.timeout).await
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
        debug!(
            provider = %self.name,
            model = %request.model,
            history = request.history.len(),
            "Opening Gemini stream"
        );

        let body = build_request(&request.history, &request.prompt);
        let response = self
            .post(&request.model, "streamGenerateContent", true, &body)
            .await?;
        Ok(sse_fragments(response, parse_event))
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let body = build_request(&[], prompt);
        let response: GenerateContentResponse = self
            .post(model, "generateContent", false, &body)
            .await?
            .json()
            .await?;
        response.into_text()
    }
}
