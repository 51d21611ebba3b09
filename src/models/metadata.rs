use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::GatewayError;

/// Which side most recently wrote the authoritative copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncDirection {
    /// Pushed from the catalog into the knowledge graph
    ToExternal,
    /// Pulled from the knowledge graph into the catalog
    ToInternal,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::ToExternal => "TO_EXTERNAL",
            SyncDirection::ToInternal => "TO_INTERNAL",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TO_EXTERNAL" => Ok(SyncDirection::ToExternal),
            "TO_INTERNAL" => Ok(SyncDirection::ToInternal),
            other => Err(GatewayError::Database(format!("unknown sync direction '{other}'"))),
        }
    }
}

/// MetadataRecord links a catalog schema (reference id) to a graph instance.
/// Maps to the `metadata` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: Uuid,
    #[serde(rename = "metadata_id")]
    pub reference_id: Uuid,
    pub kg_instance_id: Uuid,
    pub dataset_id: Uuid,
    pub direction: SyncDirection,
    #[serde(rename = "uploaded_at")]
    pub synced_at: DateTime<Utc>,
}

/// New MetadataRecord for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetadataRecord {
    pub reference_id: Uuid,
    pub kg_instance_id: Uuid,
    pub dataset_id: Uuid,
    pub direction: SyncDirection,
}

impl NewMetadataRecord {
    pub fn into_record(self, synced_at: DateTime<Utc>) -> MetadataRecord {
        MetadataRecord {
            id: Uuid::new_v4(),
            reference_id: self.reference_id,
            kg_instance_id: self.kg_instance_id,
            dataset_id: self.dataset_id,
            direction: self.direction,
            synced_at,
        }
    }
}
