mod configuration;
mod dispatch;
mod error;
mod prices;
mod routes;
mod state;
mod tools;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::dispatch::RpcDispatcher;
use crate::state::AppState;
use crate::tools::PriceSystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let settings = configuration::Settings::new()?;

    let aggregator = settings
        .prices
        .build_aggregator()
        .context("failed to build price sources")?;
    info!(sources = ?aggregator.source_names(), "price sources ready");

    let system = PriceSystem::new(Arc::new(aggregator));
    let state = AppState::new(RpcDispatcher::new(Arc::new(system)));

    // Create router with CORS support
    let app = routes::configure(state);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
