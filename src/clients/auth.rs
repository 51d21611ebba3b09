//! Auth service client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::http::ServiceHttp;
use super::AuthDirectory;
use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};

const PROJECT_ROLES: [&str; 3] = ["admin", "collaborator", "contributor"];

/// Project member as reported by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub username: String,
    /// Project role without the project-code prefix, e.g. `admin`
    pub permission: String,
}

impl ProjectMember {
    pub fn new(username: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            permission: permission.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    result: Vec<ProjectMember>,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: ServiceHttp,
}

impl AuthClient {
    pub fn new(http: ServiceHttp) -> Self {
        Self { http }
    }

    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let base = format!("{}/v1/", settings.services.auth_url.trim_end_matches('/'));
        Ok(Self::new(ServiceHttp::new(
            "auth",
            &base,
            settings.external_timeout(),
        )?))
    }
}

fn role_names(project_code: &str) -> Vec<String> {
    PROJECT_ROLES
        .iter()
        .map(|role| format!("{project_code}-{role}"))
        .collect()
}

#[async_trait]
impl AuthDirectory for AuthClient {
    async fn project_members(&self, project_code: &str) -> GatewayResult<Vec<ProjectMember>> {
        info!(project_code = %project_code, "Getting all the users and their roles from project");
        let request = self
            .http
            .client()
            .post(self.http.url("admin/roles/users")?)
            .json(&json!({
                "role_names": role_names(project_code),
                "status": "active",
            }));
        let body = self.http.send_for_json("project_members", request).await?;

        let members: MembersResponse =
            serde_json::from_value(body).map_err(|_| GatewayError::NoData)?;
        Ok(members.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_are_prefixed_with_project_code() {
        assert_eq!(
            role_names("indoctestproject"),
            vec![
                "indoctestproject-admin",
                "indoctestproject-collaborator",
                "indoctestproject-contributor"
            ]
        );
    }
}
