//! Conversation and message search over an OpenSearch cluster
//!
//! This module holds everything between the API boundary and the engine:
//!
//! - **Query Compiler**: free text + structured filters → boolean query DSL
//!   with sort, highlight and size directives
//! - **Result Normalizer**: engine hits → canonical `Message`/`Conversation`
//!   records with optional highlight fragments
//! - **Schema Registry**: per-entity field declarations used for index
//!   provisioning and for resolving exact-match filter targets
//! - **Index Backend**: the engine connection (pooled, timed out, retried
//!   for idempotent reads)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               SearchService                     │
//! │  search()  index_documents()  health()          │
//! └─────────────────────────────────────────────────┘
//!          │ compile                 ▲ normalize
//!          ▼                         │
//! ┌──────────────────┐      ┌──────────────────────┐
//! │  QueryCompiler   │      │  normalize()         │
//! │  + SchemaRegistry│      │                      │
//! └──────────────────┘      └──────────────────────┘
//!          │                         ▲
//!          ▼                         │
//! ┌─────────────────────────────────────────────────┐
//! │      IndexBackend (OpenSearchClient)            │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use threadseek::search::{
//!     IndexConfig, OpenSearchClient, SearchFilters, SearchRequest, SearchService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IndexConfig::default();
//!     let backend = Arc::new(OpenSearchClient::new(&config)?);
//!     let search = SearchService::new(backend, config);
//!
//!     let request = SearchRequest::messages("deadline")
//!         .with_filters(SearchFilters::default().with_from("sarah123"))
//!         .in_conversation("2");
//!
//!     let results = search.search(&request).await?;
//!     println!("Found {} messages", results.total);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod normalize;
mod provision;
mod query;
mod schema;
mod service;

pub use client::{BulkDocument, IndexBackend, OpenSearchClient};
pub use config::{IndexConfig, IndexConfigBuilder};
pub use error::{SearchError, SearchResult};
pub use normalize::{
    normalize, normalize_response, RawHit, RawHits, RawSearchResponse, RawTotal, SearchRecord,
    SearchResponse,
};
pub use provision::{IndexMapping, IndexOutcome, ProvisionReport, Provisioner};
pub use query::{
    BoostedField, CompiledSearch, DateBounds, Fuzziness, HighlightSpec, QueryClause,
    QueryCompiler, SearchFilters, SearchRequest, SearchType, SortField, SortOrder,
    CONVERSATION_RESULT_LIMIT, DEFAULT_SORT, HIGHLIGHT_POST_TAG, HIGHLIGHT_PRE_TAG,
};
pub use schema::{
    Entity, EntitySchema, FieldKind, FieldSpec, MappingVerification, CONVERSATION_SCHEMA,
    KEYWORD_SUBFIELD, MESSAGE_SCHEMA,
};
pub use service::{HealthReport, IndexSummary, SearchService};
