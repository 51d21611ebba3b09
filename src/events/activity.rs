//! Activity records emitted by the workflows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    KgCreate,
    KgMetadataUpload,
    KgMetadataDownload,
    KgMetadataDelete,
    KgMetadataRefresh,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::KgCreate => "kg_create",
            ActivityType::KgMetadataUpload => "kg_metadata_upload",
            ActivityType::KgMetadataDownload => "kg_metadata_download",
            ActivityType::KgMetadataDelete => "kg_metadata_delete",
            ActivityType::KgMetadataRefresh => "kg_metadata_refresh",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset activity entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_type: ActivityType,
    pub activity_time: DateTime<Utc>,
    pub user: String,
    /// Dataset code the activity belongs to
    pub container_code: String,
    pub target_name: Option<String>,
    pub version: Option<String>,
    pub changes: Vec<Value>,
}

impl ActivityRecord {
    pub fn new(
        activity_type: ActivityType,
        container_code: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            activity_type,
            activity_time: Utc::now(),
            user: user.into(),
            container_code: container_code.into(),
            target_name: None,
            version: None,
            changes: Vec::new(),
        }
    }

    pub fn with_target(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }
}

/// Fire-and-forget destination for activity records. Implementations must
/// swallow and log their own failures.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn publish(&self, record: ActivityRecord);
}

/// Typed helpers over an [`ActivitySink`]
#[derive(Clone)]
pub struct ActivityLog {
    sink: Arc<dyn ActivitySink>,
}

impl ActivityLog {
    pub fn new(sink: Arc<dyn ActivitySink>) -> Self {
        Self { sink }
    }

    pub async fn space_created(&self, dataset_code: &str, creator: &str) {
        self.sink
            .publish(ActivityRecord::new(ActivityType::KgCreate, dataset_code, creator))
            .await;
    }

    pub async fn metadata_uploaded(&self, dataset_code: &str, target_name: Option<&str>, creator: &str) {
        let mut record = ActivityRecord::new(ActivityType::KgMetadataUpload, dataset_code, creator);
        record.target_name = target_name.map(str::to_owned);
        self.sink.publish(record).await;
    }

    pub async fn metadata_downloaded(&self, dataset_code: &str, target_name: &str, creator: &str) {
        self.publish_metadata(ActivityType::KgMetadataDownload, dataset_code, target_name, creator)
            .await;
    }

    pub async fn metadata_deleted(&self, dataset_code: &str, target_name: &str, creator: &str) {
        self.publish_metadata(ActivityType::KgMetadataDelete, dataset_code, target_name, creator)
            .await;
    }

    pub async fn metadata_refreshed(&self, dataset_code: &str, target_name: &str, creator: &str) {
        self.publish_metadata(ActivityType::KgMetadataRefresh, dataset_code, target_name, creator)
            .await;
    }

    async fn publish_metadata(
        &self,
        activity_type: ActivityType,
        dataset_code: &str,
        target_name: &str,
        creator: &str,
    ) {
        self.sink
            .publish(ActivityRecord::new(activity_type, dataset_code, creator).with_target(target_name))
            .await;
    }
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLog").finish_non_exhaustive()
    }
}
