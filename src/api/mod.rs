pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::search::{IndexBackend, IndexConfig, Provisioner, SearchService};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub provisioner: Arc<Provisioner>,
}

impl AppState {
    pub fn new(search: Arc<SearchService>, provisioner: Arc<Provisioner>) -> Self {
        Self {
            search,
            provisioner,
        }
    }

    /// Wire both services to one shared backend connection
    pub fn from_backend(backend: Arc<dyn IndexBackend>, config: IndexConfig) -> Self {
        Self::new(
            Arc::new(SearchService::new(backend.clone(), config.clone())),
            Arc::new(Provisioner::new(backend, config)),
        )
    }
}
