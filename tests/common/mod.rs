//! Shared fixtures: a scripted in-memory provider and app-state builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;

use chat_relay::provider::{
    ChatProvider, FragmentStream, ProviderError, ProviderRequest, Route, RoutingTable,
};
use chat_relay::relay::{FragmentSink, RelayError};
use chat_relay::server::api::{AppState, Assistant, RelaySettings};
use chat_relay::session::InMemorySessionStore;

/// What the provider does for a given model.
#[derive(Clone, Debug)]
pub enum Script {
    /// Reject the call before streaming.
    Reject(String),
    /// Stream these fragments.
    Fragments(Vec<&'static str>),
    /// Stream these fragments, then fail.
    FragmentsThenError(Vec<&'static str>, String),
    /// Reply `"re: <prompt>"` in two fragments.
    Echo,
}

pub struct ScriptedProvider {
    scripts: HashMap<String, Script>,
    pub calls: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: &[(&str, Script)]) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts
                .iter()
                .map(|(model, script)| (model.to_string(), script.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ProviderRequest> {
        self.calls.lock().unwrap().clone()
    }
}

fn api_error(message: &str) -> ProviderError {
    ProviderError::Api {
        status: 500,
        message: message.to_string(),
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());

        let script = self
            .scripts
            .get(&request.model)
            .cloned()
            .unwrap_or_else(|| Script::Reject(format!("unknown model {}", request.model)));

        let items: Vec<Result<String, ProviderError>> = match script {
            Script::Reject(message) => return Err(api_error(&message)),
            Script::Fragments(fragments) => fragments.into_iter().map(|f| Ok(f.to_string())).collect(),
            Script::FragmentsThenError(fragments, message) => fragments
                .into_iter()
                .map(|f| Ok(f.to_string()))
                .chain(std::iter::once(Err(api_error(&message))))
                .collect(),
            Script::Echo => vec![Ok("re: ".to_string()), Ok(request.prompt.clone())],
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        match self.scripts.get(model) {
            Some(Script::Reject(message)) => Err(api_error(message)),
            Some(Script::Fragments(fragments)) => Ok(fragments.concat()),
            _ => Ok(format!("re: {prompt}")),
        }
    }
}

/// App state with one scripted provider behind every route and the assistant.
pub fn app_state(
    provider: Arc<ScriptedProvider>,
    routes: &[(&str, &[&str])],
    assistant_model: &str,
) -> Arc<AppState> {
    let mut table = RoutingTable::new();
    for (id, models) in routes {
        table.insert(
            *id,
            Route::new(provider.clone(), models.iter().map(|m| m.to_string()).collect()),
        );
    }

    Arc::new(AppState {
        routes: table,
        assistant: Assistant {
            provider: provider.clone(),
            model: assistant_model.to_string(),
        },
        sessions: Arc::new(InMemorySessionStore::new(provider, assistant_model)),
        relay: RelaySettings::default(),
        static_dir: None,
        start_time: Instant::now(),
    })
}

/// Collects writes in memory.
#[derive(Default)]
pub struct VecSink {
    pub chunks: Vec<Bytes>,
    pub close_count: usize,
}

impl VecSink {
    pub fn text(&self) -> String {
        self.chunks
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }
}

#[async_trait]
impl FragmentSink for VecSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        if self.close_count > 0 {
            return Err(RelayError::SinkClosed);
        }
        self.chunks.push(chunk);
        Ok(())
    }

    async fn close(&mut self) {
        self.close_count += 1;
    }
}
