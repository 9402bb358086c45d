//! Error types for search operations

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while compiling, executing or provisioning searches
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The index cluster could not be reached; safe to retry later
    #[error("Index unreachable: {0}")]
    IndexUnavailable(String),

    /// The compiler produced no valid query; indicates a defect, not bad input
    #[error("Query construction failed: {0}")]
    QueryConstruction(String),

    /// The engine rejected or failed to execute a search
    #[error("Search execution failed: {0}")]
    QueryFailed(String),

    /// A hit's stored document could not be decoded
    #[error("Malformed hit {id}: {reason}")]
    MalformedHit { id: String, reason: String },

    /// One or more indices do not exist
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Creating or deleting an index failed
    #[error("Provisioning of index '{index}' failed: {message}")]
    Provisioning { index: String, message: String },

    /// A submitted document violates a data-model invariant
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Bulk indexing failed or was partially rejected
    #[error("Document indexing failed: {0}")]
    Indexing(String),

    /// A live mapping does not match the declared schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Unexpected HTTP status from the engine
    #[error("HTTP {status} from index: {body}")]
    Http { status: u16, body: String },

    /// Request or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    /// Whether an idempotent request that failed with this error may be retried
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::IndexUnavailable(_) => true,
            SearchError::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}
