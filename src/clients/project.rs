//! Project service client.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::http::ServiceHttp;
use super::ProjectDirectory;
use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone)]
pub struct ProjectClient {
    http: ServiceHttp,
}

impl ProjectClient {
    pub fn new(http: ServiceHttp) -> Self {
        Self { http }
    }

    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let base = format!("{}/v1/", settings.services.project_url.trim_end_matches('/'));
        Ok(Self::new(ServiceHttp::new(
            "project",
            &base,
            settings.external_timeout(),
        )?))
    }
}

#[async_trait]
impl ProjectDirectory for ProjectClient {
    async fn project_code(&self, project_id: Uuid) -> GatewayResult<String> {
        info!(project_id = %project_id, "Getting project code");
        let request = self
            .http
            .client()
            .get(self.http.url(&format!("projects/{project_id}"))?);
        let project = self.http.send_for_json("project_code", request).await?;

        project
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(GatewayError::NoData)
    }
}
