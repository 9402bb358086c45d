use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Process liveness
        .route("/health", get(handlers::health_check))
        // Search
        .route("/api/search", post(handlers::search))
        .route("/api/search/health", get(handlers::search_health))
        // Provisioning and data
        .route("/api/search/setup", post(handlers::setup))
        .route("/api/search/mappings", get(handlers::mappings))
        .route("/api/search/index-data", post(handlers::index_data))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
