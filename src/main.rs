//! evo-gateway server entry point.
//!
//! Starts the hub dispatch loop and the Axum HTTP server with REST and
//! WebSocket endpoints.

use tracing_subscriber::EnvFilter;

use evo_gateway::build_app;
use evo_gateway::config::{GatewayConfig, LogFormat};
use evo_gateway::domain::Hub;
use evo_gateway::service::EvolutionClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting evo-gateway");

    // Start the connection registry
    let hub = Hub::spawn(config.hub.clone());

    // Build upstream client and router
    let client = EvolutionClient::new(
        &config.evolution_api_url,
        &config.evolution_api_key,
        config.evolution_api_timeout,
    )?;
    let app = build_app(client, hub);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, upstream = %config.evolution_api_url, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
