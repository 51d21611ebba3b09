//! Collaboratory workspace client.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use super::http::{bearer, check_response_error, is_conflict, read_json, CreateOutcome, ServiceHttp};
use super::CollabWorkspace;
use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};
use crate::resilience::{retry_with_backoff, RetryOn, RetryPolicy};

/// Team role inside a collab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollabRole {
    Administrator,
    Editor,
    Viewer,
}

impl CollabRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollabRole::Administrator => "administrator",
            CollabRole::Editor => "editor",
            CollabRole::Viewer => "viewer",
        }
    }

    /// Collab role granted to a project member with the given permission
    pub fn from_project_permission(permission: &str) -> Option<Self> {
        match permission {
            "admin" => Some(CollabRole::Administrator),
            "collaborator" => Some(CollabRole::Editor),
            "contributor" => Some(CollabRole::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for CollabRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollabRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(CollabRole::Administrator),
            "editor" => Ok(CollabRole::Editor),
            "viewer" => Ok(CollabRole::Viewer),
            other => Err(format!("Unknown collab role: {other}")),
        }
    }
}

#[derive(Debug, Serialize)]
struct CollabCreationRequest<'a> {
    name: &'a str,
    title: String,
    description: String,
    drive: bool,
    chat: bool,
    public: bool,
}

impl<'a> CollabCreationRequest<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            title: format!("Collab {name} for KG space"),
            description: format!("Collab {name} is created to manage KG space collab-{name}"),
            drive: true,
            chat: true,
            public: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollabClient {
    http: ServiceHttp,
    retry: RetryPolicy,
    job_polling: RetryPolicy,
}

impl CollabClient {
    /// `http` must point at the REST root that holds `v1/` and `jobstatus/`
    pub fn new(http: ServiceHttp, retry: RetryPolicy, job_polling: RetryPolicy) -> Self {
        Self {
            http,
            retry,
            job_polling,
        }
    }

    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let http = ServiceHttp::new("collab", &settings.collab_url(), settings.external_timeout())?;
        Ok(Self::new(
            http,
            RetryPolicy::standard(&settings.retry),
            RetryPolicy::job_polling(&settings.retry),
        ))
    }

    fn team_path(collab: &str, role: CollabRole) -> String {
        format!("v1/collabs/{collab}/team/{role}")
    }

    async fn post_collab(&self, collab: &str, token: &str) -> GatewayResult<CreateOutcome<Option<String>>> {
        let request = self
            .http
            .client()
            .post(self.http.url("v1/collabs")?)
            .header(AUTHORIZATION, bearer(token))
            .json(&CollabCreationRequest::new(collab));
        let response = self.http.send("create_collab", request).await?;

        if is_conflict(&response) {
            warn!(collab = %collab, "Collab was already created");
            return Ok(CreateOutcome::AlreadyExisted);
        }

        let body = read_json(check_response_error(response).await?).await?;
        info!(collab = %collab, "Collab was successfully created");
        let job = body
            .get("collabCreationKeycloakJob")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(CreateOutcome::Created(job))
    }

    async fn get_job_status(&self, job: &str, token: &str) -> GatewayResult<()> {
        let request = self
            .http
            .client()
            .get(self.http.url(&format!("jobstatus/{job}"))?)
            .header(AUTHORIZATION, bearer(token));
        let response = self.http.send("job_status", request).await?;

        if response.status() != StatusCode::OK {
            return Err(GatewayError::unhandled(
                "Collab creation job is not finished yet",
            ));
        }
        Ok(())
    }

    async fn put_team_member(
        &self,
        collab: &str,
        role: CollabRole,
        username: &str,
        token: &str,
    ) -> GatewayResult<()> {
        let path = format!("{}/users/{username}", Self::team_path(collab, role));
        let request = self
            .http
            .client()
            .put(self.http.url(&path)?)
            .header(AUTHORIZATION, bearer(token));
        let response = self.http.send("add_user", request).await?;

        if is_conflict(&response) {
            warn!(collab = %collab, username = %username, "User was already added to the collab");
            return Ok(());
        }
        check_response_error(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CollabWorkspace for CollabClient {
    async fn create_collab(&self, collab: &str, token: &str) -> GatewayResult<CreateOutcome<Option<String>>> {
        info!(collab = %collab, "Creating collab");
        retry_with_backoff(&self.retry, "create_collab", RetryOn::RemoteService, || {
            self.post_collab(collab, token)
        })
        .await
    }

    async fn wait_for_job(&self, job: &str, token: &str) -> GatewayResult<()> {
        info!(job = %job, "Checking job status");
        retry_with_backoff(&self.job_polling, "job_status", RetryOn::Unhandled, || {
            self.get_job_status(job, token)
        })
        .await
    }

    async fn add_user(&self, collab: &str, role: CollabRole, username: &str, token: &str) -> GatewayResult<()> {
        info!(collab = %collab, username = %username, role = %role, "Adding user to collab");
        retry_with_backoff(&self.retry, "add_user", RetryOn::RemoteService, || {
            self.put_team_member(collab, role, username, token)
        })
        .await
    }

    async fn remove_user(&self, collab: &str, role: CollabRole, username: &str, token: &str) -> GatewayResult<()> {
        info!(collab = %collab, username = %username, role = %role, "Removing user from collab");
        let path = format!("{}/users/{username}", Self::team_path(collab, role));
        let request = self
            .http
            .client()
            .delete(self.http.url(&path)?)
            .header(AUTHORIZATION, bearer(token));
        self.http.send_checked("remove_user", request).await?;
        Ok(())
    }

    async fn list_team(&self, collab: &str, role: CollabRole, token: &str) -> GatewayResult<Value> {
        info!(collab = %collab, role = %role, "Getting user list from collab");
        let request = self
            .http
            .client()
            .get(self.http.url(&Self::team_path(collab, role))?)
            .header(AUTHORIZATION, bearer(token));
        self.http.send_for_json("list_team", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_permission_mapping() {
        assert_eq!(
            CollabRole::from_project_permission("admin"),
            Some(CollabRole::Administrator)
        );
        assert_eq!(
            CollabRole::from_project_permission("collaborator"),
            Some(CollabRole::Editor)
        );
        assert_eq!(
            CollabRole::from_project_permission("contributor"),
            Some(CollabRole::Viewer)
        );
        assert_eq!(CollabRole::from_project_permission("owner"), None);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("editor".parse::<CollabRole>(), Ok(CollabRole::Editor));
        assert!("admin".parse::<CollabRole>().is_err());
    }

    #[test]
    fn test_creation_request_body() {
        let body = serde_json::to_value(CollabCreationRequest::new("hdc-project")).unwrap();
        assert_eq!(body["title"], "Collab hdc-project for KG space");
        assert_eq!(
            body["description"],
            "Collab hdc-project is created to manage KG space collab-hdc-project"
        );
        assert_eq!(body["public"], false);
        assert_eq!(body["drive"], true);
    }
}
