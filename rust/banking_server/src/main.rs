use anyhow::{Context, Result};
use banking_server::{router, AppState};
use common::ServiceConfig;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("banking_server=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();

    info!("======================================================================");
    info!("Banking ML Inference Server - Starting");
    info!("======================================================================");

    // Load configuration
    let config = ServiceConfig::from_env()?;
    info!("Bind address: {}", config.server.bind);
    info!("Session pool size: {}", config.models.pool_size);

    // Load models; any failure here stops the process before it serves
    let state = Arc::new(AppState::load(&config)?);

    info!("");
    info!("Server ready on http://{}", config.server.bind);
    info!("======================================================================");

    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}
