use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// Provisioning state of the remote collab and graph space behind a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceStatus {
    /// Local record committed, remote provisioning not yet confirmed
    Pending,
    Provisioned,
    Failed,
}

/// What a space belongs to, used to re-resolve its members on reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceScope {
    Standalone,
    Project,
    Dataset,
}

/// SpaceRecord maps a logical space name to its creator and provisioning state.
/// Maps to the `spaces` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRecord {
    pub name: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub status: SpaceStatus,
    pub scope: SpaceScope,
}

/// New SpaceRecord for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSpaceRecord {
    pub name: String,
    pub creator: String,
    pub scope: SpaceScope,
}

impl NewSpaceRecord {
    pub fn new(name: impl Into<String>, creator: impl Into<String>, scope: SpaceScope) -> Self {
        Self {
            name: name.into(),
            creator: creator.into(),
            scope,
        }
    }

    pub fn into_record(self, created_at: DateTime<Utc>) -> SpaceRecord {
        SpaceRecord {
            name: self.name,
            creator: self.creator,
            created_at,
            status: SpaceStatus::Pending,
            scope: self.scope,
        }
    }
}

impl SpaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceStatus::Pending => "pending",
            SpaceStatus::Provisioned => "provisioned",
            SpaceStatus::Failed => "failed",
        }
    }
}

impl SpaceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceScope::Standalone => "standalone",
            SpaceScope::Project => "project",
            SpaceScope::Dataset => "dataset",
        }
    }
}

impl fmt::Display for SpaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SpaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpaceStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SpaceStatus::Pending),
            "provisioned" => Ok(SpaceStatus::Provisioned),
            "failed" => Ok(SpaceStatus::Failed),
            other => Err(GatewayError::Database(format!("unknown space status '{other}'"))),
        }
    }
}

impl FromStr for SpaceScope {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standalone" => Ok(SpaceScope::Standalone),
            "project" => Ok(SpaceScope::Project),
            "dataset" => Ok(SpaceScope::Dataset),
            other => Err(GatewayError::Database(format!("unknown space scope '{other}'"))),
        }
    }
}
