//! chat-relay server.
//!
//! Exposes the routed chat endpoint, the Gemini assistant endpoints and the
//! session registry over HTTP.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use chat_relay::config::{Cli, Config};
use chat_relay::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "chat_relay=debug,tower_http=debug"
    } else {
        "chat_relay=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("chat-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;

    info!(
        providers = config.providers.len(),
        routes = config.routes.len(),
        assistant_provider = %config.assistant.provider,
        assistant_model = %config.assistant.model,
        "Configuration loaded"
    );
    if let Some(dir) = &config.server.static_dir {
        info!(dir = %dir.display(), "Serving single-page app");
    }

    // Build application state.
    let state = Arc::new(AppState::from_config(&config)?);

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.listen_addr(cli.listen.as_deref());
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
