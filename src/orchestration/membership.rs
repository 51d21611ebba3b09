//! Collab role changes for a user across every dataset space of a project.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::RemoteServices;
use crate::clients::{CollabRole, CollabWorkspace};
use crate::error::{GatewayError, GatewayResult};
use crate::execution::BackgroundDispatcher;
use crate::logging::log_workflow_step;
use crate::namespace::NamespaceTranslator;
use crate::store::SpaceStore;

const WORKFLOW: &str = "membership_sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Add(CollabRole),
    Remove(CollabRole),
    Replace { from: CollabRole, to: CollabRole },
}

impl MembershipChange {
    fn name(&self) -> &'static str {
        match self {
            MembershipChange::Add(_) => "invite_user",
            MembershipChange::Remove(_) => "remove_user",
            MembershipChange::Replace { .. } => "update_user",
        }
    }

    async fn apply(
        &self,
        collab_client: &dyn CollabWorkspace,
        collab: &str,
        username: &str,
        token: &str,
    ) -> GatewayResult<()> {
        match *self {
            MembershipChange::Add(role) => collab_client.add_user(collab, role, username, token).await,
            MembershipChange::Remove(role) => {
                collab_client.remove_user(collab, role, username, token).await
            }
            MembershipChange::Replace { from, to } => {
                collab_client.remove_user(collab, from, username, token).await?;
                collab_client.add_user(collab, to, username, token).await
            }
        }
    }
}

#[derive(Clone)]
pub struct MembershipSync {
    services: RemoteServices,
    spaces: Arc<dyn SpaceStore>,
    namespace: NamespaceTranslator,
    dispatcher: BackgroundDispatcher,
}

impl MembershipSync {
    pub fn new(
        services: RemoteServices,
        spaces: Arc<dyn SpaceStore>,
        namespace: NamespaceTranslator,
        dispatcher: BackgroundDispatcher,
    ) -> Self {
        Self {
            services,
            spaces,
            namespace,
            dispatcher,
        }
    }

    /// Team members of a space's collab holding `role`
    pub async fn list_members(&self, space: &str, role: CollabRole, user_token: &str) -> GatewayResult<Value> {
        let external_token = self.services.identity.exchange_token(user_token).await?;
        self.services
            .collab
            .list_team(&self.namespace.for_collab_namespace(space), role, &external_token)
            .await
    }

    pub async fn invite(&self, project_id: Uuid, username: &str, role: CollabRole) -> GatewayResult<Vec<String>> {
        self.apply(project_id, username, MembershipChange::Add(role)).await
    }

    pub async fn remove(&self, project_id: Uuid, username: &str, role: CollabRole) -> GatewayResult<Vec<String>> {
        self.apply(project_id, username, MembershipChange::Remove(role)).await
    }

    pub async fn update(
        &self,
        project_id: Uuid,
        username: &str,
        current_role: CollabRole,
        new_role: CollabRole,
    ) -> GatewayResult<Vec<String>> {
        self.apply(
            project_id,
            username,
            MembershipChange::Replace {
                from: current_role,
                to: new_role,
            },
        )
        .await
    }

    /// Resolve the project's datasets that have a local space and queue the
    /// change for each of them. Returns the targeted dataset codes.
    pub async fn apply(
        &self,
        project_id: Uuid,
        username: &str,
        change: MembershipChange,
    ) -> GatewayResult<Vec<String>> {
        let service_token = self.services.identity.service_account_token().await?;
        let dataset_codes = self.services.datasets.project_dataset_codes(project_id).await?;
        let targets = self.spaces.existing_names(&dataset_codes).await?;

        info!(
            project_id = %project_id,
            username = %username,
            change = change.name(),
            datasets = dataset_codes.len(),
            spaces = targets.len(),
            "Queueing membership change"
        );

        let collab = Arc::clone(&self.services.collab);
        let collabs: Vec<String> = targets
            .iter()
            .map(|code| self.namespace.for_collab_namespace(code))
            .collect();
        let username = username.to_string();

        self.dispatcher.dispatch(change.name(), async move {
            let mut failures = 0usize;
            for target in &collabs {
                match change
                    .apply(collab.as_ref(), target, &username, &service_token)
                    .await
                {
                    Ok(()) => log_workflow_step(WORKFLOW, change.name(), target, "completed", None),
                    Err(e) => {
                        failures += 1;
                        warn!(collab = %target, username = %username, error = %e, "Could not update user");
                    }
                }
            }
            if failures > 0 {
                return Err(GatewayError::unhandled(format!(
                    "{failures} of {} collabs were not updated",
                    collabs.len()
                )));
            }
            Ok(())
        });

        Ok(targets)
    }
}

impl std::fmt::Debug for MembershipSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipSync")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
