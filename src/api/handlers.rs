use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{Conversation, Message};
use crate::search::{
    HealthReport, IndexMapping, IndexSummary, ProvisionReport, SearchRequest, SearchResponse,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

/// Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Search conversations or messages
pub async fn search(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let response = state.search.search(&request).await?;
    Ok(Json(response))
}

/// Cluster ping, health and info; each part is best-effort
pub async fn search_health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.search.health().await)
}

/// Drop and recreate both indices.
///
/// Responds 500 with the per-index report when any index failed, so a
/// partially applied setup is visible to the caller.
pub async fn setup(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ProvisionReport>)> {
    let report = state.provisioner.provision().await?;

    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)))
}

/// Live mappings of both indices, verified against the schema registry
pub async fn mappings(State(state): State<AppState>) -> Result<Json<MappingsResponse>> {
    let mappings = state.provisioner.inspect().await?;
    let valid = mappings.iter().all(|m| m.verification.is_valid);

    Ok(Json(MappingsResponse { valid, mappings }))
}

#[derive(Debug, Serialize)]
pub struct MappingsResponse {
    pub valid: bool,
    pub mappings: Vec<IndexMapping>,
}

/// Bulk-index caller-supplied documents
pub async fn index_data(
    State(state): State<AppState>,
    payload: std::result::Result<Json<IndexDataRequest>, JsonRejection>,
) -> Result<Json<IndexSummary>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let summary = state
        .search
        .index_documents(&request.conversations, &request.messages)
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IndexDataRequest {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub messages: Vec<Message>,
}
