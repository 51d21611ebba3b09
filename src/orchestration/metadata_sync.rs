//! # Metadata Sync
//!
//! Moves metadata between the knowledge graph and the dataset catalog and
//! keeps the local record of which side wrote last.
//!
//! | Operation | Direction | Missing local record |
//! |---|---|---|
//! | upload | catalog → graph | creates one |
//! | update | catalog → graph | falls back to upload |
//! | download | graph → catalog | creates one |
//! | refresh | graph → catalog | `NotFound`, no remote call |
//! | delete | graph instance removed | `NotFound`, no remote call |
//!
//! Bulk variants run the per-item flow for every entry of a dataset and
//! return the entries that succeeded.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::RemoteServices;
use crate::clients::NewSchema;
use crate::error::{GatewayError, GatewayResult};
use crate::events::ActivityLog;
use crate::logging::log_workflow_step;
use crate::models::graph::instance_id_from;
use crate::models::{KgInstance, MetadataRecord, NewMetadataRecord, Stage, SyncDirection};
use crate::namespace::NamespaceTranslator;
use crate::store::MetadataStore;

const WORKFLOW: &str = "metadata_sync";

/// Caller-side description of an upload into the graph
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Logical space name, translated before use
    pub space: String,
    pub reference_id: Uuid,
    pub dataset_id: Uuid,
    pub uploader: String,
    /// Catalog file name reported in the activity event
    pub filename: Option<String>,
    pub content: Value,
}

#[derive(Clone)]
pub struct MetadataSync {
    services: RemoteServices,
    metadata: Arc<dyn MetadataStore>,
    namespace: NamespaceTranslator,
    activity: ActivityLog,
}

impl MetadataSync {
    pub fn new(
        services: RemoteServices,
        metadata: Arc<dyn MetadataStore>,
        namespace: NamespaceTranslator,
        activity: ActivityLog,
    ) -> Self {
        Self {
            services,
            metadata,
            namespace,
            activity,
        }
    }

    /// Graph instances of a type in a space
    pub async fn list_instances(
        &self,
        space: &str,
        instance_type: &str,
        stage: Stage,
        user_token: &str,
    ) -> GatewayResult<Vec<KgInstance>> {
        let external_token = self.services.identity.exchange_token(user_token).await?;
        self.services
            .graph
            .list_instances(
                &self.namespace.for_graph_namespace(space),
                stage,
                instance_type,
                &external_token,
            )
            .await?
            .into_iter()
            .map(KgInstance::from_kg_response)
            .collect()
    }

    /// Local records for the reference ids that were uploaded before
    pub async fn uploaded(&self, reference_ids: &[Uuid]) -> GatewayResult<Vec<MetadataRecord>> {
        self.metadata.list_by_reference_ids(reference_ids).await
    }

    /// Raw draft-stage content of a graph instance
    pub async fn get_instance(&self, kg_instance_id: Uuid, user_token: &str) -> GatewayResult<Value> {
        let external_token = self.services.identity.exchange_token(user_token).await?;
        self.services
            .graph
            .get_instance(kg_instance_id, Stage::InProgress, &external_token)
            .await
    }

    /// Import a graph instance into a dataset as an openMINDS schema
    pub async fn download(
        &self,
        kg_instance_id: Uuid,
        dataset_id: Uuid,
        uploader: &str,
        filename: Option<&str>,
        user_token: &str,
    ) -> GatewayResult<Value> {
        match self.metadata.get_by_kg_instance_id(kg_instance_id).await {
            Ok(_) => return Err(GatewayError::MetadataAlreadyExists),
            Err(GatewayError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let external_token = self.services.identity.exchange_token(user_token).await?;
        let template_id = self.services.datasets.openminds_template_id().await?;
        let content = self.current_content(kg_instance_id, &external_token).await?;

        let schema = NewSchema::openminds(dataset_id, template_id, uploader, filename, content)?;
        let target_name = schema.name.clone();
        let created = self.services.datasets.create_schema(schema).await?;
        let schema_id = created
            .get("geid")
            .and_then(Value::as_str)
            .and_then(|geid| Uuid::parse_str(geid).ok())
            .ok_or(GatewayError::NoData)?;

        self.metadata
            .upsert(NewMetadataRecord {
                reference_id: schema_id,
                kg_instance_id,
                dataset_id,
                direction: SyncDirection::ToInternal,
            })
            .await?;
        log_workflow_step(WORKFLOW, "download", &kg_instance_id.to_string(), "completed", None);

        if let Some(code) = self.dataset_code_for_event(dataset_id).await {
            self.activity.metadata_downloaded(&code, &target_name, uploader).await;
        }
        Ok(created)
    }

    /// Create a graph instance from catalog content and record it. A reference
    /// id that is already linked is refused; use [`Self::update`] instead.
    pub async fn upload(&self, request: UploadRequest, user_token: &str) -> GatewayResult<KgInstance> {
        match self.metadata.get_by_reference_id(request.reference_id).await {
            Ok(_) => return Err(GatewayError::MetadataAlreadyExists),
            Err(GatewayError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let external_token = self.services.identity.exchange_token(user_token).await?;
        self.upload_with(request, &external_token).await
    }

    /// Update the graph instance linked to `reference_id`, or upload it when
    /// there is no link yet
    pub async fn update(&self, request: UploadRequest, user_token: &str) -> GatewayResult<KgInstance> {
        let external_token = self.services.identity.exchange_token(user_token).await?;

        match self.metadata.get_by_reference_id(request.reference_id).await {
            Ok(record) => {
                let data = self
                    .services
                    .graph
                    .update_instance(record.kg_instance_id, request.content, &external_token)
                    .await?;
                let instance = KgInstance::from_kg_response(data)?;
                self.metadata
                    .update_direction(record.reference_id, SyncDirection::ToExternal)
                    .await?;
                log_workflow_step(WORKFLOW, "update", &record.reference_id.to_string(), "completed", None);
                Ok(instance)
            }
            Err(GatewayError::NotFound) => {
                info!(metadata_id = %request.reference_id, "No previous upload, uploading instead");
                self.upload_with(request, &external_token).await
            }
            Err(e) => Err(e),
        }
    }

    /// Pull the current graph content of an uploaded record into the catalog
    pub async fn refresh(&self, reference_id: Uuid, username: &str, user_token: &str) -> GatewayResult<Value> {
        let record = self.metadata.get_by_reference_id(reference_id).await?;
        let external_token = self.services.identity.exchange_token(user_token).await?;
        self.refresh_record(&record, username, &external_token).await
    }

    /// Refresh every record of a dataset, skipping the ones that fail
    pub async fn refresh_dataset(
        &self,
        dataset_id: Uuid,
        username: &str,
        user_token: &str,
    ) -> GatewayResult<Vec<Value>> {
        let external_token = self.services.identity.exchange_token(user_token).await?;
        let records = self.metadata.list_by_dataset(dataset_id).await?;

        let mut refreshed = Vec::with_capacity(records.len());
        for record in &records {
            match self.refresh_record(record, username, &external_token).await {
                Ok(result) => refreshed.push(result),
                Err(e) => warn!(
                    metadata_id = %record.reference_id,
                    error = %e,
                    "Could not refresh metadata, continuing"
                ),
            }
        }
        info!(dataset_id = %dataset_id, total = records.len(), refreshed = refreshed.len(), "Bulk refresh finished");
        Ok(refreshed)
    }

    /// Push every catalog schema of a dataset into the graph, updating linked
    /// instances and uploading the rest
    pub async fn update_dataset(
        &self,
        dataset_id: Uuid,
        username: &str,
        user_token: &str,
    ) -> GatewayResult<Vec<Value>> {
        let external_token = self.services.identity.exchange_token(user_token).await?;
        let dataset_code = self.services.datasets.dataset_code(dataset_id).await?;
        let schemas = self.services.datasets.dataset_schemas(dataset_id).await?;
        let graph_space = self.namespace.for_graph_namespace(&dataset_code);

        let mut updated = Vec::with_capacity(schemas.len());
        for schema in schemas {
            let schema_id = schema.geid;
            let result = self
                .push_schema(schema_id, dataset_id, schema.content, &graph_space, &external_token)
                .await;
            match result {
                Ok(data) => {
                    self.activity
                        .metadata_uploaded(&dataset_code, Some(&schema_id.to_string()), username)
                        .await;
                    updated.push(data);
                }
                Err(e) => warn!(
                    metadata_id = %schema_id,
                    error = %e,
                    "Could not push metadata, continuing"
                ),
            }
        }
        Ok(updated)
    }

    /// Delete a graph instance, then its local record
    pub async fn delete(&self, kg_instance_id: Uuid, username: &str, user_token: &str) -> GatewayResult<()> {
        let record = self.metadata.get_by_kg_instance_id(kg_instance_id).await?;
        let external_token = self.services.identity.exchange_token(user_token).await?;

        self.services
            .graph
            .delete_instance(kg_instance_id, &external_token)
            .await?;
        self.metadata.delete_by_kg_instance_id(kg_instance_id).await?;
        log_workflow_step(WORKFLOW, "delete", &kg_instance_id.to_string(), "completed", None);

        if let Some(code) = self.dataset_code_for_event(record.dataset_id).await {
            self.activity
                .metadata_deleted(&code, &kg_instance_id.to_string(), username)
                .await;
        }
        Ok(())
    }

    async fn upload_with(&self, request: UploadRequest, external_token: &str) -> GatewayResult<KgInstance> {
        let UploadRequest {
            space,
            reference_id,
            dataset_id,
            uploader,
            filename,
            content,
        } = request;

        let data = self
            .services
            .graph
            .create_instance(&self.namespace.for_graph_namespace(&space), content, external_token)
            .await?;
        let instance = KgInstance::from_kg_response(data)?;

        self.metadata
            .upsert(NewMetadataRecord {
                reference_id,
                kg_instance_id: instance.id,
                dataset_id,
                direction: SyncDirection::ToExternal,
            })
            .await?;
        log_workflow_step(WORKFLOW, "upload", &reference_id.to_string(), "completed", None);

        if let Some(code) = self.dataset_code_for_event(dataset_id).await {
            self.activity
                .metadata_uploaded(&code, filename.as_deref(), &uploader)
                .await;
        }
        Ok(instance)
    }

    async fn refresh_record(
        &self,
        record: &MetadataRecord,
        username: &str,
        external_token: &str,
    ) -> GatewayResult<Value> {
        let content = self
            .current_content(record.kg_instance_id, external_token)
            .await?;
        let refreshed = self
            .services
            .datasets
            .update_schema(record.reference_id, username, content)
            .await?;
        self.metadata
            .update_direction(record.reference_id, SyncDirection::ToInternal)
            .await?;
        log_workflow_step(WORKFLOW, "refresh", &record.reference_id.to_string(), "completed", None);

        let target_name = refreshed
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| record.reference_id.to_string());
        if let Some(code) = self.dataset_code_for_event(record.dataset_id).await {
            self.activity
                .metadata_refreshed(&code, &target_name, username)
                .await;
        }
        Ok(refreshed)
    }

    async fn push_schema(
        &self,
        schema_id: Uuid,
        dataset_id: Uuid,
        content: Value,
        graph_space: &str,
        external_token: &str,
    ) -> GatewayResult<Value> {
        match self.metadata.get_by_reference_id(schema_id).await {
            Ok(record) => {
                let data = self
                    .services
                    .graph
                    .update_instance(record.kg_instance_id, content, external_token)
                    .await?;
                self.metadata
                    .update_direction(schema_id, SyncDirection::ToExternal)
                    .await?;
                Ok(data)
            }
            Err(GatewayError::NotFound) => {
                let data = self
                    .services
                    .graph
                    .create_instance(graph_space, content, external_token)
                    .await?;
                let at_id = data
                    .get("@id")
                    .and_then(Value::as_str)
                    .ok_or(GatewayError::NoData)?;
                let kg_instance_id = instance_id_from(at_id)?;
                self.metadata
                    .upsert(NewMetadataRecord {
                        reference_id: schema_id,
                        kg_instance_id,
                        dataset_id,
                        direction: SyncDirection::ToExternal,
                    })
                    .await?;
                Ok(data)
            }
            Err(e) => Err(e),
        }
    }

    /// Content of an instance read from the stage matching its release status
    async fn current_content(&self, kg_instance_id: Uuid, external_token: &str) -> GatewayResult<Value> {
        let stage = self
            .services
            .graph
            .readable_stage(kg_instance_id, external_token)
            .await?;
        self.services
            .graph
            .get_instance(kg_instance_id, stage, external_token)
            .await
    }

    /// Dataset code for an activity event. Lookup failures only skip the event.
    async fn dataset_code_for_event(&self, dataset_id: Uuid) -> Option<String> {
        match self.services.datasets.dataset_code(dataset_id).await {
            Ok(code) => Some(code),
            Err(e) => {
                warn!(dataset_id = %dataset_id, error = %e, "Dataset code unavailable, activity event skipped");
                None
            }
        }
    }
}

impl std::fmt::Debug for MetadataSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataSync")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
