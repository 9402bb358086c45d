//! Connection to the external search engine
//!
//! [`IndexBackend`] is the minimal surface the rest of the crate needs from
//! the engine. [`OpenSearchClient`] implements it over the OpenSearch REST
//! API with a single pooled HTTP client, a bounded per-request timeout and
//! bounded retries for idempotent reads. Create, delete and bulk calls are
//! never retried.

use crate::search::config::IndexConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::normalize::RawSearchResponse;
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// A document to write, keyed by its id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkDocument {
    pub id: String,
    pub document: Value,
}

/// Operations the crate needs from the search engine
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Run a search body against an index
    async fn search(&self, index: &str, body: &Value) -> SearchResult<RawSearchResponse>;

    /// Write documents, refreshing so they are immediately searchable.
    /// Returns the number of documents accepted.
    async fn bulk_index(&self, index: &str, documents: &[BulkDocument]) -> SearchResult<usize>;

    async fn index_exists(&self, index: &str) -> SearchResult<bool>;

    /// Create an index from a `{ "mappings": ... }` body
    async fn create_index(&self, index: &str, body: &Value) -> SearchResult<Value>;

    async fn delete_index(&self, index: &str) -> SearchResult<()>;

    /// The live `mappings` object of an index
    async fn get_mapping(&self, index: &str) -> SearchResult<Value>;

    /// Whether the cluster answers at all
    async fn ping(&self) -> bool;

    /// Cluster health document
    async fn health(&self) -> SearchResult<Value>;

    /// Cluster name/version document
    async fn info(&self) -> SearchResult<Value>;
}

/// OpenSearch REST client
#[derive(Clone)]
pub struct OpenSearchClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl OpenSearchClient {
    /// Build a client; the underlying connection pool lives as long as it does
    pub fn new(config: &IndexConfig) -> SearchResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(config.request_timeout())
            .gzip(config.compression)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .default_headers(headers)
            .user_agent(concat!("threadseek/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                SearchError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials: config.credentials(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match self.credentials {
            Some((ref user, ref pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    /// Send and turn non-2xx statuses into [`SearchError::Http`]
    async fn send(&self, builder: RequestBuilder) -> SearchResult<Response> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SearchError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json(&self, builder: RequestBuilder) -> SearchResult<Value> {
        let response = self.send(builder).await?;
        response
            .json()
            .await
            .map_err(|e| SearchError::QueryFailed(format!("Invalid response body: {}", e)))
    }

    /// Run an idempotent operation, retrying transient failures with
    /// exponential backoff
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> SearchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SearchResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_backoff, attempt);
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient index failure, retrying"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff that saturates instead of overflowing on large attempt counts
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt))
}

fn transport_error(err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::IndexUnavailable(format!("request timed out: {}", err))
    } else if err.is_connect() || err.is_request() {
        SearchError::IndexUnavailable(format!("connection failed: {}", err))
    } else {
        SearchError::QueryFailed(err.to_string())
    }
}

fn not_found_as(index: &str, err: SearchError) -> SearchError {
    match err {
        SearchError::Http { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            SearchError::IndexNotFound(index.to_string())
        }
        other => other,
    }
}

fn provisioning(index: &str, err: SearchError) -> SearchError {
    match err {
        SearchError::IndexUnavailable(_) => err,
        other => SearchError::Provisioning {
            index: index.to_string(),
            message: other.to_string(),
        },
    }
}

/// NDJSON body for the `_bulk` endpoint
fn bulk_body(index: &str, documents: &[BulkDocument]) -> SearchResult<String> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&doc.document)?);
        body.push('\n');
    }
    Ok(body)
}

/// First item-level failure reported by a `_bulk` response
fn first_bulk_failure(response: &Value) -> Option<String> {
    response["items"].as_array()?.iter().find_map(|item| {
        let result = item.get("index")?;
        let error = result.get("error")?;
        Some(format!(
            "document {}: {}",
            result["_id"].as_str().unwrap_or("?"),
            error["reason"].as_str().unwrap_or("unknown reason")
        ))
    })
}

#[async_trait]
impl IndexBackend for OpenSearchClient {
    async fn search(&self, index: &str, body: &Value) -> SearchResult<RawSearchResponse> {
        debug!(index, "Executing search");
        let path = format!("{}/_search", index);

        let raw = self
            .with_retry("search", || {
                self.send_json(self.request(Method::POST, &path).json(body))
            })
            .await
            .map_err(|e| match not_found_as(index, e) {
                err @ SearchError::Http { .. } if err.is_transient() => {
                    SearchError::IndexUnavailable(err.to_string())
                }
                SearchError::Http { status, body } => {
                    SearchError::QueryFailed(format!("HTTP {}: {}", status, body))
                }
                other => other,
            })?;

        serde_json::from_value(raw)
            .map_err(|e| SearchError::QueryFailed(format!("Unexpected search response: {}", e)))
    }

    async fn bulk_index(&self, index: &str, documents: &[BulkDocument]) -> SearchResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let body = bulk_body(index, documents)?;
        let response = self
            .send_json(
                self.request(Method::POST, "_bulk?refresh=true")
                    .header(header::CONTENT_TYPE, "application/x-ndjson")
                    .body(body),
            )
            .await
            .map_err(|e| match e {
                SearchError::IndexUnavailable(_) => e,
                other => SearchError::Indexing(other.to_string()),
            })?;

        if response["errors"].as_bool().unwrap_or(false) {
            let reason = first_bulk_failure(&response)
                .unwrap_or_else(|| "bulk request reported errors".to_string());
            return Err(SearchError::Indexing(format!("index '{}': {}", index, reason)));
        }

        Ok(documents.len())
    }

    async fn index_exists(&self, index: &str) -> SearchResult<bool> {
        let result = self
            .with_retry("index_exists", || self.send(self.request(Method::HEAD, index)))
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SearchError::Http { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> SearchResult<Value> {
        self.send_json(self.request(Method::PUT, index).json(body))
            .await
            .map_err(|e| provisioning(index, e))
    }

    async fn delete_index(&self, index: &str) -> SearchResult<()> {
        self.send(self.request(Method::DELETE, index))
            .await
            .map(|_| ())
            .map_err(|e| match not_found_as(index, e) {
                SearchError::IndexNotFound(_) => SearchError::IndexNotFound(index.to_string()),
                other => provisioning(index, other),
            })
    }

    async fn get_mapping(&self, index: &str) -> SearchResult<Value> {
        let path = format!("{}/_mapping", index);
        let response = self
            .with_retry("get_mapping", || self.send_json(self.request(Method::GET, &path)))
            .await
            .map_err(|e| not_found_as(index, e))?;

        // Keyed by concrete index name, which differs from `index` behind an alias
        let entry = response
            .get(index)
            .or_else(|| response.as_object().and_then(|m| m.values().next()));

        entry
            .and_then(|e| e.get("mappings"))
            .cloned()
            .ok_or_else(|| SearchError::Schema(format!("No mappings returned for '{}'", index)))
    }

    async fn ping(&self) -> bool {
        self.with_retry("ping", || self.send(self.request(Method::HEAD, "")))
            .await
            .map_err(|e| debug!(error = %e, "Ping failed"))
            .is_ok()
    }

    async fn health(&self) -> SearchResult<Value> {
        self.with_retry("health", || {
            self.send_json(self.request(Method::GET, "_cluster/health"))
        })
        .await
    }

    async fn info(&self) -> SearchResult<Value> {
        self.with_retry("info", || self.send_json(self.request(Method::GET, "")))
            .await
    }
}
