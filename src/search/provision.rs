//! Destructive index provisioning and mapping inspection
//!
//! Provisioning drops and recreates every entity index from the schema
//! registry. It is not transactional across indices: each index is handled
//! on its own and the report says which ones made it. It is never retried
//! automatically and never runs on the query path.

use crate::search::client::IndexBackend;
use crate::search::config::IndexConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::schema::{Entity, MappingVerification};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Result of provisioning one index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutcome {
    pub entity: Entity,
    pub index: String,
    /// Whether an existing index was dropped first
    pub replaced: bool,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<MappingVerification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexOutcome {
    fn new(entity: Entity, index: &str) -> Self {
        Self {
            entity,
            index: index.to_string(),
            replaced: false,
            created: false,
            verification: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.created
            && self.error.is_none()
            && self.verification.as_ref().is_some_and(|v| v.is_valid)
    }
}

/// Per-index results of a provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub success: bool,
    pub indices: Vec<IndexOutcome>,
}

impl ProvisionReport {
    fn from_outcomes(indices: Vec<IndexOutcome>) -> Self {
        Self {
            success: indices.iter().all(IndexOutcome::succeeded),
            indices,
        }
    }

    pub fn outcome(&self, entity: Entity) -> Option<&IndexOutcome> {
        self.indices.iter().find(|o| o.entity == entity)
    }
}

/// Live mapping of one index checked against the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMapping {
    pub entity: Entity,
    pub index: String,
    pub mappings: Value,
    pub verification: MappingVerification,
}

/// Applies and inspects the registry's index schemas
pub struct Provisioner {
    backend: Arc<dyn IndexBackend>,
    config: IndexConfig,
}

impl Provisioner {
    pub fn new(backend: Arc<dyn IndexBackend>, config: IndexConfig) -> Self {
        Self { backend, config }
    }

    /// Drop and recreate every entity index, destroying their documents
    pub async fn provision(&self) -> SearchResult<ProvisionReport> {
        self.backend.health().await.map_err(|e| match e {
            SearchError::IndexUnavailable(_) => e,
            other => SearchError::IndexUnavailable(other.to_string()),
        })?;

        let mut outcomes = Vec::with_capacity(Entity::ALL.len());
        for entity in Entity::ALL {
            let index = self.config.index_name(entity);
            let mut outcome = IndexOutcome::new(entity, index);

            if let Err(e) = self.provision_index(entity, &mut outcome).await {
                error!(index, error = %e, "Failed to provision index");
                outcome.error = Some(e.to_string());
            }
            outcomes.push(outcome);
        }

        let report = ProvisionReport::from_outcomes(outcomes);
        if report.success {
            info!("All search indices provisioned");
        }
        Ok(report)
    }

    async fn provision_index(
        &self,
        entity: Entity,
        outcome: &mut IndexOutcome,
    ) -> SearchResult<()> {
        let index = self.config.index_name(entity);
        let schema = entity.schema();

        if self.backend.index_exists(index).await? {
            info!(index, "Deleting existing index");
            self.backend.delete_index(index).await?;
            outcome.replaced = true;
        }

        info!(index, "Creating index");
        self.backend.create_index(index, &schema.index_body()).await?;
        outcome.created = true;

        let live = self.backend.get_mapping(index).await?;
        let verification = MappingVerification::from_errors(schema.verify(&live));
        if !verification.is_valid {
            error!(index, errors = ?verification.errors, "Created index does not match schema");
        }
        outcome.verification = Some(verification);

        Ok(())
    }

    /// Fetch and verify the live mappings of every entity index.
    ///
    /// Fails with [`SearchError::IndexNotFound`] naming each absent index.
    pub async fn inspect(&self) -> SearchResult<Vec<IndexMapping>> {
        let mut missing = Vec::new();
        for entity in Entity::ALL {
            let index = self.config.index_name(entity);
            if !self.backend.index_exists(index).await? {
                missing.push(index.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(SearchError::IndexNotFound(format!(
                "{} (run setup first)",
                missing.join(", ")
            )));
        }

        let mut mappings = Vec::with_capacity(Entity::ALL.len());
        for entity in Entity::ALL {
            let index = self.config.index_name(entity);
            let live = self.backend.get_mapping(index).await?;
            let verification = MappingVerification::from_errors(entity.schema().verify(&live));
            mappings.push(IndexMapping {
                entity,
                index: index.to_string(),
                mappings: live,
                verification,
            });
        }
        Ok(mappings)
    }
}
