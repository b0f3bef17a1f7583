//! Chat relay HTTP API.
//!
//! - POST /api/chat                         routed chat, chunked text stream
//! - GET  /api/models                       routable model ids
//! - POST /api/assistant/complete           single-shot completion
//! - POST /api/assistant/stream             stateless SSE stream
//! - GET|POST|DELETE /api/assistant/session/{id}
//! - GET  /health
//!
//! Anything else falls through to the single-page app, when configured.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::provider::{ChatMessage, ChatProvider, ProviderRequest, RoutingTable};
use crate::relay::{Framing, Relay};
use crate::server::streaming::relay_response;
use crate::session::{InMemorySessionStore, SessionStore};

/// Application state shared across handlers.
pub struct AppState {
    pub routes: RoutingTable,
    pub assistant: Assistant,
    pub sessions: Arc<dyn SessionStore>,
    pub relay: RelaySettings,
    pub static_dir: Option<PathBuf>,
    pub start_time: Instant,
}

/// Backend of the `/api/assistant` endpoints.
#[derive(Clone)]
pub struct Assistant {
    pub provider: Arc<dyn ChatProvider>,
    pub model: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub body_channel_capacity: usize,
    pub idle_timeout: Option<Duration>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            body_channel_capacity: 32,
            idle_timeout: None,
        }
    }
}

impl RelaySettings {
    fn relay(&self, framing: Framing) -> Relay {
        Relay::new(framing).with_idle_timeout(self.idle_timeout)
    }
}

impl AppState {
    /// Wire providers, routes and the session registry from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let (routes, providers) = RoutingTable::from_config(config, client);

        let provider = providers
            .get(&config.assistant.provider)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown assistant provider {:?}", config.assistant.provider))?;
        let assistant = Assistant {
            provider: provider.clone(),
            model: config.assistant.model.clone(),
        };
        let sessions = Arc::new(InMemorySessionStore::new(provider, config.assistant.model.clone()));

        Ok(Self {
            routes,
            assistant,
            sessions,
            relay: RelaySettings {
                body_channel_capacity: config.server.body_channel_capacity,
                idle_timeout: config.server.idle_timeout(),
            },
            static_dir: config.server.static_dir.clone(),
            start_time: Instant::now(),
        })
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/models", get(list_models))
        .route("/api/assistant/complete", post(assistant_complete))
        .route("/api/assistant/stream", post(assistant_stream))
        .route("/api/assistant/session", any(missing_session_id))
        .route(
            "/api/assistant/session/{id}",
            get(session_history).post(session_send).delete(session_delete),
        )
        .route("/health", get(health));

    let router = match &state.static_dir {
        Some(dir) => api.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => api,
    };

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Body of `POST /api/chat`.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default, rename = "providerModelId", alias = "model")]
    pub provider_model_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

/// Body of the assistant endpoints. `history` is read by the stateless
/// stream only.
#[derive(Debug, Default, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub sessions: usize,
}

/// Parse a JSON request body regardless of its declared content type.
/// An empty body parses as the default request; malformed JSON is a 400.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))
}

fn require_prompt(prompt: Option<String>) -> Result<String, AppError> {
    prompt
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::missing_field("prompt"))
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: ChatRequest = parse_body(&body)?;
    let model_id = req
        .provider_model_id
        .ok_or_else(|| AppError::missing_field("model"))?;
    let prompt = require_prompt(req.prompt)?;
    let history = req.history.unwrap_or_default();

    let route = state
        .routes
        .resolve(&model_id)
        .ok_or_else(|| AppError::Validation(format!("Unknown model: {model_id}")))?;

    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        model = %model_id,
        provider = route.provider.name(),
        history = history.len(),
        "Chat request"
    );

    let (model, fragments) = route.open_stream(&prompt, &history).await?;
    debug!(%request_id, model = %model, "Provider accepted request");

    Ok(relay_response(
        fragments,
        state.relay.relay(Framing::Raw),
        state.relay.body_channel_capacity,
        request_id,
    )
    .await)
}

async fn assistant_complete(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<String, AppError> {
    let req: PromptRequest = parse_body(&body)?;
    let prompt = require_prompt(req.prompt)?;
    info!(model = %state.assistant.model, "Assistant completion");

    let text = state
        .assistant
        .provider
        .complete(&state.assistant.model, &prompt)
        .await?;
    Ok(text)
}

async fn assistant_stream(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: PromptRequest = parse_body(&body)?;
    let prompt = require_prompt(req.prompt)?;
    let history = req.history.unwrap_or_default();

    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        model = %state.assistant.model,
        history = history.len(),
        "Assistant stream request"
    );

    let fragments = state
        .assistant
        .provider
        .stream_chat(ProviderRequest {
            model: state.assistant.model.clone(),
            prompt,
            history,
        })
        .await?;

    Ok(relay_response(
        fragments,
        state.relay.relay(Framing::EventStream),
        state.relay.body_channel_capacity,
        request_id,
    )
    .await)
}

async fn missing_session_id() -> AppError {
    AppError::Validation("Missing chat id.".to_string())
}

async fn session_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::session_not_found(&id))?;
    Ok(Json(session.conversation.history().await))
}

async fn session_send(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: PromptRequest = parse_body(&body)?;
    let prompt = require_prompt(req.prompt)?;
    let session = state.sessions.create_or_get(&id).await;

    let request_id = Uuid::new_v4();
    info!(%request_id, session = %session.id, "Session message");

    let fragments = session.conversation.send_message_stream(prompt).await?;

    Ok(relay_response(
        fragments,
        state.relay.relay(Framing::EventStream),
        state.relay.body_channel_capacity,
        request_id,
    )
    .await)
}

async fn session_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .remove(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| AppError::session_not_found(&id))
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(ModelList {
        models: state.routes.ids().map(str::to_string).collect(),
    })
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        sessions: state.sessions.len().await,
    })
}
