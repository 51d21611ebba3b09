//! # Local Record Store
//!
//! Narrow repository interfaces for the two record types the gateway owns.
//! Workflows depend only on [`SpaceStore`] and [`MetadataStore`]; the
//! backing engine is chosen at startup.
//!
//! ## Implementations
//!
//! - [`memory::InMemoryStore`]: `dashmap` backed, used by tests and the
//!   `memory` backend
//! - [`postgres::PostgresStore`]: `sqlx` backed, with embedded migrations
//!
//! Uniqueness of the primary keys is the only concurrency guard. A racing
//! duplicate insert surfaces as a conflict error, never a silent merge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::error::GatewayResult;
use crate::models::{
    MetadataRecord, NewMetadataRecord, NewSpaceRecord, SpaceRecord, SpaceStatus, SyncDirection,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait SpaceStore: Send + Sync {
    /// Insert a new `pending` space. Fails with `SpaceAlreadyExists` when the
    /// name is taken.
    async fn insert(&self, space: NewSpaceRecord) -> GatewayResult<SpaceRecord>;

    /// Fails with `NotFound` when absent
    async fn get(&self, name: &str) -> GatewayResult<SpaceRecord>;

    /// Fails with `NotFound` when absent
    async fn delete(&self, name: &str) -> GatewayResult<()>;

    /// Records for the subset of `names` present in the store
    async fn list_by_names(&self, names: &[String]) -> GatewayResult<Vec<SpaceRecord>>;

    async fn update_status(&self, name: &str, status: SpaceStatus) -> GatewayResult<()>;

    /// Failed spaces plus pending spaces created before `pending_before`
    async fn list_reconcilable(&self, pending_before: DateTime<Utc>) -> GatewayResult<Vec<SpaceRecord>>;

    /// Cheap liveness probe
    async fn ping(&self) -> GatewayResult<()>;

    async fn exists(&self, name: &str) -> GatewayResult<bool> {
        Ok(!self.list_by_names(&[name.to_string()]).await?.is_empty())
    }

    /// The subset of `names` present in the store, in input order
    async fn existing_names(&self, names: &[String]) -> GatewayResult<Vec<String>> {
        let found = self.list_by_names(names).await?;
        Ok(names
            .iter()
            .filter(|name| found.iter().any(|space| &space.name == *name))
            .cloned()
            .collect())
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record, or overwrite only direction and timestamp of the
    /// record holding the same reference id. Fails with
    /// `MetadataAlreadyExists` when another reference id already points at
    /// the graph instance.
    async fn upsert(&self, record: NewMetadataRecord) -> GatewayResult<MetadataRecord>;

    async fn get_by_reference_id(&self, reference_id: Uuid) -> GatewayResult<MetadataRecord>;

    async fn get_by_kg_instance_id(&self, kg_instance_id: Uuid) -> GatewayResult<MetadataRecord>;

    async fn list_by_reference_ids(&self, reference_ids: &[Uuid]) -> GatewayResult<Vec<MetadataRecord>>;

    async fn list_by_dataset(&self, dataset_id: Uuid) -> GatewayResult<Vec<MetadataRecord>>;

    /// Record which side last wrote the metadata and bump the sync timestamp
    async fn update_direction(
        &self,
        reference_id: Uuid,
        direction: SyncDirection,
    ) -> GatewayResult<MetadataRecord>;

    async fn delete_by_kg_instance_id(&self, kg_instance_id: Uuid) -> GatewayResult<()>;
}

/// Both stores behind one handle
#[derive(Clone)]
pub struct RecordStores {
    pub spaces: Arc<dyn SpaceStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl RecordStores {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            spaces: store.clone(),
            metadata: store,
        }
    }

    /// Build the configured backend, running migrations when enabled
    pub async fn connect(config: &DatabaseConfig) -> GatewayResult<Self> {
        match config.backend {
            StoreBackend::Memory => Ok(Self::in_memory()),
            StoreBackend::Postgres => {
                let store = Arc::new(PostgresStore::connect(config).await?);
                if config.run_migrations {
                    store.migrate().await?;
                }
                Ok(Self {
                    spaces: store.clone(),
                    metadata: store,
                })
            }
        }
    }
}

impl std::fmt::Debug for RecordStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStores").finish_non_exhaustive()
    }
}
