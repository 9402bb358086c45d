use std::sync::Arc;
use threadseek::{
    api::{build_router, AppState},
    config::Config,
    search::OpenSearchClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    let level = &config.observability.log_level;
    let json_logs = config.observability.json_logs;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("threadseek={},tower_http={}", level, level).into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting threadseek v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(url = %config.index.url, "Search cluster");

    // One pooled client shared by every request
    let backend = Arc::new(OpenSearchClient::new(&config.index)?);
    let state = AppState::from_backend(backend, config.index.clone());

    if !state.search.health().await.ping {
        tracing::warn!("Search cluster is not reachable yet; searches will fail until it is");
    }

    let app = build_router(state);

    // Start HTTP server
    let http_addr = config.bind_address();
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shut down gracefully");
    Ok(())
}
