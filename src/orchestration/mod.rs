//! # Orchestration Workflows
//!
//! Multi-step business transactions composed from the remote service clients
//! and the local record store:
//!
//! - [`SpaceProvisioner`]: space creation with background provisioning, the
//!   dataset-scoped compensating delete, and the reconciliation sweep
//! - [`MembershipSync`]: collab role changes across every dataset of a project
//! - [`MetadataSync`]: bi-directional metadata sync between the knowledge
//!   graph and the dataset catalog
//!
//! Within one invocation every remote call and store mutation runs strictly
//! in order. The only loops (member sync, per-dataset role changes, bulk
//! metadata sync) are sequential and best-effort per item.

use std::sync::Arc;

use crate::clients::{
    AuthClient, AuthDirectory, CollabClient, CollabWorkspace, DatasetCatalog, DatasetClient,
    IdentityBroker, KeycloakClient, KnowledgeGraph, KnowledgeGraphClient, ProjectClient,
    ProjectDirectory,
};
use crate::config::Settings;
use crate::error::GatewayResult;

pub mod membership;
pub mod metadata_sync;
pub mod space_provisioner;

pub use membership::{MembershipChange, MembershipSync};
pub use metadata_sync::MetadataSync;
pub use space_provisioner::SpaceProvisioner;

/// Every remote collaborator a workflow may call
#[derive(Clone)]
pub struct RemoteServices {
    pub identity: Arc<dyn IdentityBroker>,
    pub graph: Arc<dyn KnowledgeGraph>,
    pub collab: Arc<dyn CollabWorkspace>,
    pub datasets: Arc<dyn DatasetCatalog>,
    pub projects: Arc<dyn ProjectDirectory>,
    pub auth: Arc<dyn AuthDirectory>,
}

impl RemoteServices {
    /// HTTP-backed collaborators built from settings
    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        Ok(Self {
            identity: Arc::new(KeycloakClient::from_settings(settings)?),
            graph: Arc::new(KnowledgeGraphClient::from_settings(settings)?),
            collab: Arc::new(CollabClient::from_settings(settings)?),
            datasets: Arc::new(DatasetClient::from_settings(settings)?),
            projects: Arc::new(ProjectClient::from_settings(settings)?),
            auth: Arc::new(AuthClient::from_settings(settings)?),
        })
    }
}

impl std::fmt::Debug for RemoteServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteServices").finish_non_exhaustive()
    }
}
