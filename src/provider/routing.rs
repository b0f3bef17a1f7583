//! Explicit routing from client-facing model ids to providers.
//!
//! Each id maps to one provider and a family of backend model names that
//! are tried in order. Ids absent from the table are rejected.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::Config;
use crate::provider::{
    build_provider, stream_with_fallback, ChatMessage, ChatProvider, FragmentStream,
    ProviderError,
};

/// A resolved route.
#[derive(Clone)]
pub struct Route {
    pub provider: Arc<dyn ChatProvider>,
    pub models: Vec<String>,
}

impl Route {
    pub fn new(provider: Arc<dyn ChatProvider>, models: Vec<String>) -> Self {
        Self { provider, models }
    }

    /// Open a stream, falling back through the model family.
    pub async fn open_stream(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<(String, FragmentStream), ProviderError> {
        stream_with_fallback(self.provider.as_ref(), &self.models, prompt, history).await
    }
}

/// Model id → route.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: BTreeMap<String, Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, route: Route) {
        self.routes.insert(id.into(), route);
    }

    pub fn resolve(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Client-facing model ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Build every configured provider and the routing table over them.
    ///
    /// Returns the providers by name alongside the table so the assistant
    /// endpoints can share the same clients.
    pub fn from_config(
        config: &Config,
        client: reqwest::Client,
    ) -> (Self, HashMap<String, Arc<dyn ChatProvider>>) {
        let providers: HashMap<String, Arc<dyn ChatProvider>> = config
            .providers
            .iter()
            .map(|(name, cfg)| (name.clone(), build_provider(name, cfg, client.clone())))
            .collect();

        let mut table = Self::new();
        for route in &config.routes {
            // Config::validate guarantees the provider exists.
            if let Some(provider) = providers.get(&route.provider) {
                table.insert(route.id.clone(), Route::new(provider.clone(), route.models.clone()));
            }
        }
        (table, providers)
    }
}
