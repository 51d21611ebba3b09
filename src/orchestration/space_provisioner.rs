//! # Space Provisioning
//!
//! Creating a space is split in two halves:
//!
//! 1. **Synchronous**: refuse names already stored locally (before any remote
//!    call), resolve the caller, insert a `pending` record, and resolve the
//!    member list for project/dataset scoped spaces.
//! 2. **Background**: ensure the collab exists (409 counts as success), add
//!    the creator as administrator, sync member roles one by one, create the
//!    graph space, then mark the record `provisioned` or `failed`.
//!
//! Only the dataset-scoped variant rolls back: when its member resolution
//! fails the inserted record is deleted and the error is returned.
//! Failed and stale pending spaces are picked up again by [`SpaceProvisioner::reconcile`].

use chrono::Utc;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::RemoteServices;
use crate::clients::{CollabRole, CreateOutcome, ProjectMember};
use crate::error::{GatewayError, GatewayResult};
use crate::events::ActivityLog;
use crate::execution::BackgroundDispatcher;
use crate::logging::log_workflow_step;
use crate::models::{GraphSpace, NewSpaceRecord, SpaceRecord, SpaceScope, SpaceStatus};
use crate::namespace::NamespaceTranslator;
use crate::store::SpaceStore;

const WORKFLOW: &str = "space_provisioning";

/// Inputs of one background provisioning run
#[derive(Debug, Clone)]
struct ProvisioningJob {
    space: String,
    creator: String,
    members: Vec<ProjectMember>,
    /// Token used for member sync
    member_token: String,
    service_token: String,
}

#[derive(Clone)]
pub struct SpaceProvisioner {
    services: RemoteServices,
    spaces: Arc<dyn SpaceStore>,
    namespace: NamespaceTranslator,
    dispatcher: BackgroundDispatcher,
    activity: ActivityLog,
    /// Spaces with a provisioning run queued or running in this process
    in_flight: Arc<DashSet<String>>,
}

impl SpaceProvisioner {
    pub fn new(
        services: RemoteServices,
        spaces: Arc<dyn SpaceStore>,
        namespace: NamespaceTranslator,
        dispatcher: BackgroundDispatcher,
        activity: ActivityLog,
    ) -> Self {
        Self {
            services,
            spaces,
            namespace,
            dispatcher,
            activity,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Managed graph spaces visible to the caller
    pub async fn list_graph_spaces(&self, user_token: &str) -> GatewayResult<Vec<GraphSpace>> {
        let external_token = self.services.identity.exchange_token(user_token).await?;
        let spaces = self.services.graph.list_spaces(&external_token).await?;
        Ok(spaces
            .into_iter()
            .filter(|space| self.namespace.is_managed_graph_space(&space.name))
            .collect())
    }

    pub async fn get_space(&self, name: &str) -> GatewayResult<SpaceRecord> {
        self.spaces.get(name).await
    }

    /// Stored records for the subset of `names` that exist locally
    pub async fn existing_spaces(&self, names: &[String]) -> GatewayResult<Vec<SpaceRecord>> {
        self.spaces.list_by_names(names).await
    }

    /// Standalone space owned by `creator`, provisioned with the service account
    pub async fn create_standalone(&self, name: &str, creator: &str) -> GatewayResult<SpaceRecord> {
        self.ensure_absent(name).await?;
        let service_token = self.services.identity.service_account_token().await?;

        let space = self
            .spaces
            .insert(NewSpaceRecord::new(name, creator, SpaceScope::Standalone))
            .await?;
        log_workflow_step(WORKFLOW, "persist_intent", name, "completed", None);

        self.dispatch_provisioning(ProvisioningJob {
            space: space.name.clone(),
            creator: space.creator.clone(),
            members: Vec::new(),
            member_token: service_token.clone(),
            service_token,
        });
        Ok(space)
    }

    /// Space for a project, synced with the project's members
    pub async fn create_for_project(&self, project_code: &str, user_token: &str) -> GatewayResult<SpaceRecord> {
        self.ensure_absent(project_code).await?;
        let (external_token, service_token, creator) = self.resolve_caller(user_token).await?;

        let space = self
            .spaces
            .insert(NewSpaceRecord::new(project_code, &creator, SpaceScope::Project))
            .await?;
        log_workflow_step(WORKFLOW, "persist_intent", project_code, "completed", None);

        let members = match self.services.auth.project_members(project_code).await {
            Ok(members) => members,
            Err(e) => {
                error!(space = %project_code, error = %e, "Could not resolve project members");
                self.mark(project_code, SpaceStatus::Failed).await;
                return Err(e);
            }
        };

        self.dispatch_provisioning(ProvisioningJob {
            space: space.name.clone(),
            creator,
            members,
            member_token: external_token,
            service_token,
        });
        Ok(space)
    }

    /// Space for a dataset, synced with the owning project's members. The
    /// local record is removed again when the members cannot be resolved.
    pub async fn create_for_dataset(&self, dataset_code: &str, user_token: &str) -> GatewayResult<SpaceRecord> {
        self.ensure_absent(dataset_code).await?;
        let (external_token, service_token, creator) = self.resolve_caller(user_token).await?;

        let space = self
            .spaces
            .insert(NewSpaceRecord::new(dataset_code, &creator, SpaceScope::Dataset))
            .await?;
        log_workflow_step(WORKFLOW, "persist_intent", dataset_code, "completed", None);
        self.activity.space_created(dataset_code, &creator).await;

        let members = match self.dataset_members(dataset_code).await {
            Ok(members) => members,
            Err(e) => {
                warn!(space = %dataset_code, error = %e, "Member resolution failed, removing space record");
                if let Err(delete_error) = self.spaces.delete(dataset_code).await {
                    error!(space = %dataset_code, error = %delete_error, "Compensating delete failed");
                }
                log_workflow_step(WORKFLOW, "compensate", dataset_code, "completed", None);
                return Err(e);
            }
        };

        self.dispatch_provisioning(ProvisioningJob {
            space: space.name.clone(),
            creator,
            members,
            member_token: external_token,
            service_token,
        });
        Ok(space)
    }

    /// Re-queue provisioning for failed spaces and for pending spaces older
    /// than `older_than`. Returns the re-queued names.
    pub async fn reconcile(&self, older_than: Duration) -> GatewayResult<Vec<String>> {
        let grace = chrono::Duration::from_std(older_than)
            .map_err(|e| GatewayError::Configuration(format!("Invalid grace period: {e}")))?;
        let candidates: Vec<SpaceRecord> = self
            .spaces
            .list_reconcilable(Utc::now() - grace)
            .await?
            .into_iter()
            .filter(|space| !self.in_flight.contains(&space.name))
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        info!(count = candidates.len(), "Reconciling unprovisioned spaces");
        let service_token = self.services.identity.service_account_token().await?;

        let mut requeued = Vec::with_capacity(candidates.len());
        for space in candidates {
            let members = match space.scope {
                SpaceScope::Standalone => Ok(Vec::new()),
                SpaceScope::Project => self.services.auth.project_members(&space.name).await,
                SpaceScope::Dataset => self.dataset_members(&space.name).await,
            };
            let members = match members {
                Ok(members) => members,
                Err(e) => {
                    warn!(space = %space.name, error = %e, "Skipping reconciliation, members unavailable");
                    continue;
                }
            };

            self.dispatch_provisioning(ProvisioningJob {
                space: space.name.clone(),
                creator: space.creator,
                members,
                member_token: service_token.clone(),
                service_token: service_token.clone(),
            });
            requeued.push(space.name);
        }
        Ok(requeued)
    }

    async fn ensure_absent(&self, name: &str) -> GatewayResult<()> {
        if self.spaces.exists(name).await? {
            warn!(space = %name, "Space was already created");
            return Err(GatewayError::SpaceAlreadyExists);
        }
        Ok(())
    }

    /// External token, service-account token and username of the caller
    async fn resolve_caller(&self, user_token: &str) -> GatewayResult<(String, String, String)> {
        let external_token = self.services.identity.exchange_token(user_token).await?;
        let service_token = self.services.identity.service_account_token().await?;
        let creator = self.services.graph.current_username(&external_token).await?;
        Ok((external_token, service_token, creator))
    }

    async fn dataset_members(&self, dataset_code: &str) -> GatewayResult<Vec<ProjectMember>> {
        let project_id = self.services.datasets.project_id(dataset_code).await?;
        let project_code = self.services.projects.project_code(project_id).await?;
        self.services.auth.project_members(&project_code).await
    }

    async fn mark(&self, space: &str, status: SpaceStatus) {
        if let Err(e) = self.spaces.update_status(space, status).await {
            error!(space = %space, status = %status, error = %e, "Could not update space status");
        }
    }

    fn dispatch_provisioning(&self, job: ProvisioningJob) {
        self.in_flight.insert(job.space.clone());
        let this = self.clone();
        let name = format!("provision_space:{}", job.space);

        self.dispatcher.dispatch(name, async move {
            let space = job.space.clone();
            let result = this.provision(job).await;
            let status = match &result {
                Ok(()) => SpaceStatus::Provisioned,
                Err(_) => SpaceStatus::Failed,
            };
            this.mark(&space, status).await;
            this.in_flight.remove(&space);
            log_workflow_step(WORKFLOW, "finish", &space, status.as_str(), None);
            result
        });
    }

    async fn provision(&self, job: ProvisioningJob) -> GatewayResult<()> {
        let collab = self.namespace.for_collab_namespace(&job.space);

        let outcome = self
            .services
            .collab
            .ensure_collab_created(&collab, &job.service_token)
            .await?;
        let collab_status = match outcome {
            CreateOutcome::Created(()) => "created",
            CreateOutcome::AlreadyExisted => "already_existed",
        };
        log_workflow_step(WORKFLOW, "ensure_collab", &job.space, collab_status, None);

        self.services
            .collab
            .add_user(&collab, CollabRole::Administrator, &job.creator, &job.service_token)
            .await?;
        log_workflow_step(WORKFLOW, "add_creator", &job.space, "completed", None);

        self.sync_members(&collab, &job.members, &job.member_token).await;

        let graph_space = self.namespace.for_graph_namespace(&job.space);
        self.services
            .graph
            .create_space(&graph_space, &job.service_token)
            .await?;
        log_workflow_step(WORKFLOW, "create_graph_space", &job.space, "completed", None);
        info!(space = %job.space, "Space was successfully created");
        Ok(())
    }

    /// Add members one at a time. A failing member is logged and skipped.
    async fn sync_members(&self, collab: &str, members: &[ProjectMember], token: &str) {
        info!(collab = %collab, count = members.len(), "Syncing users of collab");
        for member in members {
            let Some(role) = CollabRole::from_project_permission(&member.permission) else {
                warn!(
                    collab = %collab,
                    username = %member.username,
                    permission = %member.permission,
                    "Unknown project permission, member skipped"
                );
                continue;
            };
            if let Err(e) = self
                .services
                .collab
                .add_user(collab, role, &member.username, token)
                .await
            {
                warn!(collab = %collab, username = %member.username, error = %e, "Could not sync member");
            }
        }
    }
}

impl std::fmt::Debug for SpaceProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceProvisioner")
            .field("namespace", &self.namespace)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}
