//! Search service: the request path from API boundary to engine and back

use crate::models::{Conversation, Message};
use crate::search::client::{BulkDocument, IndexBackend};
use crate::search::config::IndexConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::normalize::{normalize_response, SearchResponse};
use crate::search::query::{QueryCompiler, SearchRequest};
use crate::search::schema::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use validator::Validate;

/// Best-effort connectivity snapshot of the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub ping: bool,
    pub health: Option<Value>,
    pub info: Option<Value>,
    pub error: Option<String>,
}

/// Counts of documents written by [`SearchService::index_documents`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSummary {
    pub conversations: usize,
    pub messages: usize,
}

/// Compiles, executes and normalizes searches against the configured indices
pub struct SearchService {
    backend: Arc<dyn IndexBackend>,
    compiler: QueryCompiler,
    config: IndexConfig,
}

impl SearchService {
    pub fn new(backend: Arc<dyn IndexBackend>, config: IndexConfig) -> Self {
        let compiler = QueryCompiler::new().with_highlighting(config.enable_highlighting);
        Self {
            backend,
            compiler,
            config,
        }
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Run one search round trip
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        let start_time = Instant::now();

        if self.config.preflight_ping && !self.backend.ping().await {
            warn!("Search cluster did not answer ping");
            return Err(SearchError::IndexUnavailable(
                "Failed to connect to the search cluster".to_string(),
            ));
        }

        let compiled = self.compiler.compile(request)?;
        let index = self.config.index_name(compiled.target);

        // A missing index means the cluster was never provisioned, not a bad request
        let raw = self
            .backend
            .search(index, &compiled.body())
            .await
            .map_err(|e| match e {
                SearchError::IndexNotFound(index) => {
                    SearchError::QueryFailed(format!("index '{}' does not exist", index))
                }
                other => other,
            })?;
        let response = normalize_response(compiled.target, raw)?;

        info!(
            index,
            search_type = %request.search_type,
            hits = response.hits.len(),
            total = response.total,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Search completed"
        );

        Ok(response)
    }

    /// Validate and bulk-write caller-supplied documents
    pub async fn index_documents(
        &self,
        conversations: &[Conversation],
        messages: &[Message],
    ) -> SearchResult<IndexSummary> {
        for conversation in conversations {
            conversation.validate().map_err(|e| {
                SearchError::InvalidDocument(format!("conversation {}: {}", conversation.id, e))
            })?;
        }
        for message in messages {
            message.validate().map_err(|e| {
                SearchError::InvalidDocument(format!("message {}: {}", message.id, e))
            })?;
        }

        let conversation_docs = to_bulk(conversations, |c| c.id.clone())?;
        let message_docs = to_bulk(messages, |m| m.id.clone())?;

        let summary = IndexSummary {
            conversations: self
                .backend
                .bulk_index(self.config.index_name(Entity::Conversation), &conversation_docs)
                .await?,
            messages: self
                .backend
                .bulk_index(self.config.index_name(Entity::Message), &message_docs)
                .await?,
        };

        info!(
            conversations = summary.conversations,
            messages = summary.messages,
            "Documents indexed"
        );
        Ok(summary)
    }

    /// Ping, cluster health and info, each attempted independently
    pub async fn health(&self) -> HealthReport {
        let ping = self.backend.ping().await;

        let health = self
            .backend
            .health()
            .await
            .map_err(|e| warn!(error = %e, "Cluster health check failed"))
            .ok();

        let info = self
            .backend
            .info()
            .await
            .map_err(|e| warn!(error = %e, "Cluster info check failed"))
            .ok();

        HealthReport {
            ping,
            health,
            info,
            error: (!ping).then(|| "Search cluster did not answer ping".to_string()),
        }
    }
}

fn to_bulk<T, F>(items: &[T], id: F) -> SearchResult<Vec<BulkDocument>>
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    items
        .iter()
        .map(|item| {
            Ok(BulkDocument {
                id: id(item),
                document: serde_json::to_value(item)?,
            })
        })
        .collect()
}
