//! In-memory record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{MetadataStore, SpaceStore};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    MetadataRecord, NewMetadataRecord, NewSpaceRecord, SpaceRecord, SpaceStatus, SyncDirection,
};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    spaces: DashMap<String, SpaceRecord>,
    /// Metadata records keyed by reference id
    metadata: DashMap<Uuid, MetadataRecord>,
    /// kg_instance_id -> reference id
    instance_index: DashMap<Uuid, Uuid>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpaceStore for InMemoryStore {
    async fn insert(&self, space: NewSpaceRecord) -> GatewayResult<SpaceRecord> {
        match self.spaces.entry(space.name.clone()) {
            Entry::Occupied(_) => Err(GatewayError::SpaceAlreadyExists),
            Entry::Vacant(slot) => {
                let record = space.into_record(Utc::now());
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get(&self, name: &str) -> GatewayResult<SpaceRecord> {
        self.spaces
            .get(name)
            .map(|space| space.clone())
            .ok_or(GatewayError::NotFound)
    }

    async fn delete(&self, name: &str) -> GatewayResult<()> {
        self.spaces
            .remove(name)
            .map(|_| ())
            .ok_or(GatewayError::NotFound)
    }

    async fn list_by_names(&self, names: &[String]) -> GatewayResult<Vec<SpaceRecord>> {
        Ok(names
            .iter()
            .filter_map(|name| self.spaces.get(name).map(|space| space.clone()))
            .collect())
    }

    async fn update_status(&self, name: &str, status: SpaceStatus) -> GatewayResult<()> {
        let mut space = self.spaces.get_mut(name).ok_or(GatewayError::NotFound)?;
        space.status = status;
        Ok(())
    }

    async fn list_reconcilable(&self, pending_before: DateTime<Utc>) -> GatewayResult<Vec<SpaceRecord>> {
        let mut spaces: Vec<SpaceRecord> = self
            .spaces
            .iter()
            .filter(|space| match space.status {
                SpaceStatus::Failed => true,
                SpaceStatus::Pending => space.created_at < pending_before,
                SpaceStatus::Provisioned => false,
            })
            .map(|space| space.clone())
            .collect();
        spaces.sort_by_key(|space| space.created_at);
        Ok(spaces)
    }

    async fn ping(&self) -> GatewayResult<()> {
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn upsert(&self, record: NewMetadataRecord) -> GatewayResult<MetadataRecord> {
        let now = Utc::now();
        match self.metadata.entry(record.reference_id) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.direction = record.direction;
                existing.synced_at = now;
                Ok(existing.clone())
            }
            Entry::Vacant(slot) => match self.instance_index.entry(record.kg_instance_id) {
                Entry::Occupied(_) => Err(GatewayError::MetadataAlreadyExists),
                Entry::Vacant(index) => {
                    index.insert(record.reference_id);
                    let record = record.into_record(now);
                    slot.insert(record.clone());
                    Ok(record)
                }
            },
        }
    }

    async fn get_by_reference_id(&self, reference_id: Uuid) -> GatewayResult<MetadataRecord> {
        self.metadata
            .get(&reference_id)
            .map(|record| record.clone())
            .ok_or(GatewayError::NotFound)
    }

    async fn get_by_kg_instance_id(&self, kg_instance_id: Uuid) -> GatewayResult<MetadataRecord> {
        let reference_id = self
            .instance_index
            .get(&kg_instance_id)
            .map(|reference| *reference)
            .ok_or(GatewayError::NotFound)?;
        self.get_by_reference_id(reference_id).await
    }

    async fn list_by_reference_ids(&self, reference_ids: &[Uuid]) -> GatewayResult<Vec<MetadataRecord>> {
        Ok(reference_ids
            .iter()
            .filter_map(|id| self.metadata.get(id).map(|record| record.clone()))
            .collect())
    }

    async fn list_by_dataset(&self, dataset_id: Uuid) -> GatewayResult<Vec<MetadataRecord>> {
        let mut records: Vec<MetadataRecord> = self
            .metadata
            .iter()
            .filter(|record| record.dataset_id == dataset_id)
            .map(|record| record.clone())
            .collect();
        records.sort_by_key(|record| record.synced_at);
        Ok(records)
    }

    async fn update_direction(
        &self,
        reference_id: Uuid,
        direction: SyncDirection,
    ) -> GatewayResult<MetadataRecord> {
        let mut record = self
            .metadata
            .get_mut(&reference_id)
            .ok_or(GatewayError::NotFound)?;
        record.direction = direction;
        record.synced_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete_by_kg_instance_id(&self, kg_instance_id: Uuid) -> GatewayResult<()> {
        let (_, reference_id) = self
            .instance_index
            .remove(&kg_instance_id)
            .ok_or(GatewayError::NotFound)?;
        self.metadata.remove(&reference_id);
        Ok(())
    }
}
