//! # Remote Service Clients
//!
//! Typed wrappers around every HTTP API the gateway talks to. Each client sits
//! behind an `async_trait` seam so orchestration workflows can be driven by
//! test doubles, and every implementation normalizes upstream answers through
//! [`http::ServiceHttp`].
//!
//! Retries live inside the implementations. Workflows only ever observe the
//! terminal result of an operation.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{GraphSpace, Stage};

pub mod auth;
pub mod collab;
pub mod dataset;
pub mod http;
pub mod keycloak;
pub mod knowledge_graph;
pub mod project;

pub use auth::{AuthClient, ProjectMember};
pub use collab::{CollabClient, CollabRole};
pub use dataset::{DatasetClient, DatasetSchema, NewSchema, SchemaTemplate, OPENMINDS_TEMPLATE};
pub use http::{CreateOutcome, ServiceHttp};
pub use keycloak::KeycloakClient;
pub use knowledge_graph::KnowledgeGraphClient;
pub use project::ProjectClient;

/// Identity broker (Keycloak)
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Exchange a platform token for an EBRAINS token
    async fn exchange_token(&self, token: &str) -> GatewayResult<String>;

    /// Token representing the gateway itself
    async fn service_account_token(&self) -> GatewayResult<String>;
}

/// Knowledge graph store (v3 API)
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    async fn list_spaces(&self, token: &str) -> GatewayResult<Vec<GraphSpace>>;

    async fn create_space(&self, graph_space: &str, token: &str) -> GatewayResult<()>;

    async fn list_instances(
        &self,
        graph_space: &str,
        stage: Stage,
        instance_type: &str,
        token: &str,
    ) -> GatewayResult<Vec<Value>>;

    async fn get_instance(&self, instance_id: Uuid, stage: Stage, token: &str) -> GatewayResult<Value>;

    /// Raw release status, e.g. `RELEASED`, `UNRELEASED`, `HAS_CHANGED`
    async fn release_status(&self, instance_id: Uuid, token: &str) -> GatewayResult<String>;

    async fn create_instance(&self, graph_space: &str, content: Value, token: &str) -> GatewayResult<Value>;

    async fn update_instance(&self, instance_id: Uuid, content: Value, token: &str) -> GatewayResult<Value>;

    async fn delete_instance(&self, instance_id: Uuid, token: &str) -> GatewayResult<()>;

    /// Username (`alternateName`) of the token's owner
    async fn current_username(&self, token: &str) -> GatewayResult<String>;

    /// Stage an instance should be read from, based on its release status
    async fn readable_stage(&self, instance_id: Uuid, token: &str) -> GatewayResult<Stage> {
        let status = self.release_status(instance_id, token).await?;
        Ok(Stage::from_release_status(&status))
    }
}

/// Collaboratory workspace service
#[async_trait]
pub trait CollabWorkspace: Send + Sync {
    /// Create a collab. `Created` carries the keycloak job handle, if any.
    async fn create_collab(&self, collab: &str, token: &str) -> GatewayResult<CreateOutcome<Option<String>>>;

    /// Succeeds once the job behind `job` has finished
    async fn wait_for_job(&self, job: &str, token: &str) -> GatewayResult<()>;

    /// Add a team member. An existing membership counts as success.
    async fn add_user(&self, collab: &str, role: CollabRole, username: &str, token: &str) -> GatewayResult<()>;

    async fn remove_user(&self, collab: &str, role: CollabRole, username: &str, token: &str) -> GatewayResult<()>;

    async fn list_team(&self, collab: &str, role: CollabRole, token: &str) -> GatewayResult<Value>;

    /// Create the collab and wait until its keycloak roles exist
    async fn ensure_collab_created(&self, collab: &str, token: &str) -> GatewayResult<CreateOutcome<()>> {
        match self.create_collab(collab, token).await? {
            CreateOutcome::Created(job) => {
                if let Some(job) = job {
                    self.wait_for_job(&job, token).await?;
                }
                Ok(CreateOutcome::Created(()))
            }
            CreateOutcome::AlreadyExisted => Ok(CreateOutcome::AlreadyExisted),
        }
    }
}

/// Dataset catalog service
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Project id owning a dataset. Fails with `NoProject` when unattached.
    async fn project_id(&self, dataset_code: &str) -> GatewayResult<Uuid>;

    async fn dataset_code(&self, dataset_id: Uuid) -> GatewayResult<String>;

    async fn project_dataset_codes(&self, project_id: Uuid) -> GatewayResult<Vec<String>>;

    async fn schema_templates(&self) -> GatewayResult<Vec<SchemaTemplate>>;

    /// Create a schema, returning the catalog's `result` object
    async fn create_schema(&self, schema: NewSchema) -> GatewayResult<Value>;

    /// Replace a schema's content, returning the catalog's `result` object
    async fn update_schema(&self, schema_id: Uuid, username: &str, content: Value) -> GatewayResult<Value>;

    async fn dataset_schemas(&self, dataset_id: Uuid) -> GatewayResult<Vec<DatasetSchema>>;

    async fn openminds_template_id(&self) -> GatewayResult<Uuid> {
        self.schema_templates()
            .await?
            .into_iter()
            .find(|template| template.name == OPENMINDS_TEMPLATE)
            .map(|template| template.geid)
            .ok_or_else(|| GatewayError::unhandled("Cannot find OpenMINDS template for metadata"))
    }
}

/// Project service
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn project_code(&self, project_id: Uuid) -> GatewayResult<String>;
}

/// Auth service
#[async_trait]
pub trait AuthDirectory: Send + Sync {
    /// Active members of a project with their project permission
    async fn project_members(&self, project_code: &str) -> GatewayResult<Vec<ProjectMember>>;
}
