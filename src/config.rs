//! Runtime configuration for chat-relay.
//!
//! Configuration is loaded from a JSON file or falls back to defaults that
//! reproduce the stock deployment (OpenAI, DeepSeek, NeuroGPT and Gemini).
//! API keys never live in the file: each provider names the environment
//! variable its key is read from at request time.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-relay", about = "Streaming LLM chat relay server")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address. Overrides the config file and `PORT`.
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream providers, keyed by name.
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Client-facing model ids and the provider models they map to.
    pub routes: Vec<RouteConfig>,

    /// Provider and model behind the `/api/assistant` endpoints.
    pub assistant: AssistantConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                kind: ProviderKind::OpenAiCompatible,
                base_url: None,
                base_url_env: None,
                api_key_env: "OPENAI_API_KEY".to_string(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            },
        );
        providers.insert(
            "deepseek".to_string(),
            ProviderConfig {
                kind: ProviderKind::OpenAiCompatible,
                base_url: Some("https://api.deepseek.com/v1".to_string()),
                base_url_env: Some("DEEPSEEKAI_BASE_URL".to_string()),
                api_key_env: "DEEPSEEKAI_API_KEY".to_string(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            },
        );
        providers.insert(
            "neurogpt".to_string(),
            ProviderConfig {
                kind: ProviderKind::OpenAiCompatible,
                base_url: None,
                base_url_env: Some("NEUROGPT_BASE_URL".to_string()),
                api_key_env: "NEUROGPT_API_KEY".to_string(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            },
        );
        providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                kind: ProviderKind::Gemini,
                base_url: None,
                base_url_env: None,
                api_key_env: "GEMINI_KEY".to_string(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            },
        );

        let route = |id: &str, provider: &str, models: &[&str]| RouteConfig {
            id: id.to_string(),
            provider: provider.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
        };

        Self {
            server: ServerConfig::default(),
            providers,
            routes: vec![
                route("gpt-4", "neurogpt", &["gpt-4-1106-preview"]),
                route("gpt-4o", "openai", &["gpt-4o"]),
                route("gpt-3.5-turbo", "openai", &["gpt-3.5-turbo"]),
                route("deepseek-chat", "deepseek", &["deepseek-chat"]),
                route("deepseek-coder", "deepseek", &["deepseek-coder"]),
            ],
            assistant: AssistantConfig::default(),
        }
    }
}

/// Issue timeout for provider calls: connect plus wait for response headers.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:3001").
    pub listen: String,

    /// Directory holding the single-page app build. `None` disables the
    /// static fallback.
    pub static_dir: Option<PathBuf>,

    /// Frames buffered between the relay task and the response body.
    pub body_channel_capacity: usize,

    /// Abort a relay when no fragment arrives for this long (0 = disabled).
    pub idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3001".to_string(),
            static_dir: None,
            body_channel_capacity: 32,
            idle_timeout_ms: 0,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `POST /chat/completions` with SSE deltas.
    OpenAiCompatible,
    /// Google Generative Language API.
    Gemini,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiCompatible => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

/// One upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// Base URL; falls back to the kind's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable that, when set, overrides `base_url`.
    #[serde(default)]
    pub base_url_env: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Issue timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ProviderConfig {
    /// Resolve the base URL: environment override, then file, then default.
    pub fn resolve_base_url(&self) -> String {
        self.base_url_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|url| !url.is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| self.kind.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Maps a client-facing model id to a provider and a family of equivalent
/// backend models, tried in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub id: String,
    pub provider: String,
    pub models: Vec<String>,
}

/// Backend for the assistant endpoints (single-shot, stateless stream and
/// sessions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub provider: String,
    pub model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-pro".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject routes that point at unknown providers or carry no models.
    pub fn validate(&self) -> anyhow::Result<()> {
        for route in &self.routes {
            if !self.providers.contains_key(&route.provider) {
                bail!("route {:?} references unknown provider {:?}", route.id, route.provider);
            }
            if route.models.is_empty() {
                bail!("route {:?} has an empty model family", route.id);
            }
        }
        if !self.providers.contains_key(&self.assistant.provider) {
            bail!("assistant references unknown provider {:?}", self.assistant.provider);
        }
        Ok(())
    }

    /// Listen address: CLI flag, then `PORT`, then the config file.
    pub fn listen_addr(&self, cli_listen: Option<&str>) -> String {
        if let Some(addr) = cli_listen {
            return addr.to_string();
        }
        match std::env::var("PORT") {
            Ok(port) if !port.is_empty() => format!("0.0.0.0:{port}"),
            _ => self.server.listen.clone(),
        }
    }
}
