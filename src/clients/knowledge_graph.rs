//! EBRAINS knowledge graph client (v3 API).

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use super::http::{bearer, ServiceHttp};
use super::KnowledgeGraph;
use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};
use crate::models::graph::{strip_meta_vocabulary, SCHEMA_ALTERNATE_NAME};
use crate::models::{GraphSpace, Stage};
use crate::resilience::{retry_with_backoff, RetryOn, RetryPolicy};

#[derive(Debug, Clone)]
pub struct KnowledgeGraphClient {
    http: ServiceHttp,
    retry: RetryPolicy,
}

impl KnowledgeGraphClient {
    /// `http` must point at the `v3/` root of the API
    pub fn new(http: ServiceHttp, retry: RetryPolicy) -> Self {
        Self { http, retry }
    }

    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let http = ServiceHttp::new(
            "knowledge_graph",
            &format!("{}v3/", settings.kg_url()),
            settings.external_timeout(),
        )?;
        Ok(Self::new(http, RetryPolicy::standard(&settings.retry)))
    }

    async fn put_space_specification(&self, graph_space: &str, token: &str) -> GatewayResult<()> {
        let url = self.http.url(&format!("spaces/{graph_space}/specification"))?;
        let request = self.http.client().put(url).header(AUTHORIZATION, bearer(token));
        let response = self.http.send("create_space", request).await?;

        if response.status() != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(space = %graph_space, "Could not create a space");
            return Err(GatewayError::unhandled(format!(
                "Could not create a space: {body}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KnowledgeGraph for KnowledgeGraphClient {
    async fn list_spaces(&self, token: &str) -> GatewayResult<Vec<GraphSpace>> {
        info!("Getting all the spaces");
        let request = self
            .http
            .client()
            .get(self.http.url("spaces")?)
            .header(AUTHORIZATION, bearer(token));
        let data = self.http.send_for_data("list_spaces", request).await?;

        match data {
            Value::Array(items) => Ok(items.iter().filter_map(GraphSpace::from_kg_data).collect()),
            _ => Err(GatewayError::NoData),
        }
    }

    async fn create_space(&self, graph_space: &str, token: &str) -> GatewayResult<()> {
        info!(space = %graph_space, "Creating a space");
        retry_with_backoff(&self.retry, "create_space", RetryOn::Unhandled, || {
            self.put_space_specification(graph_space, token)
        })
        .await
    }

    async fn list_instances(
        &self,
        graph_space: &str,
        stage: Stage,
        instance_type: &str,
        token: &str,
    ) -> GatewayResult<Vec<Value>> {
        info!(space = %graph_space, stage = stage.as_str(), "Getting metadata from space");
        let request = self
            .http
            .client()
            .get(self.http.url("instances")?)
            .query(&[
                ("space", graph_space),
                ("stage", stage.as_str()),
                ("type", instance_type),
            ])
            .header(AUTHORIZATION, bearer(token));

        match self.http.send_for_data("list_instances", request).await? {
            Value::Array(items) => Ok(items),
            _ => Err(GatewayError::NoData),
        }
    }

    async fn get_instance(&self, instance_id: Uuid, stage: Stage, token: &str) -> GatewayResult<Value> {
        info!(kg_instance_id = %instance_id, stage = stage.as_str(), "Getting details of metadata");
        let request = self
            .http
            .client()
            .get(self.http.url(&format!("instances/{instance_id}"))?)
            .query(&[("stage", stage.as_str())])
            .header(AUTHORIZATION, bearer(token));
        self.http.send_for_data("get_instance", request).await
    }

    async fn release_status(&self, instance_id: Uuid, token: &str) -> GatewayResult<String> {
        info!(kg_instance_id = %instance_id, "Checking status of metadata");
        let request = self
            .http
            .client()
            .get(self.http.url(&format!("instances/{instance_id}/release/status"))?)
            .query(&[("releaseTreeScope", "TOP_INSTANCE_ONLY")])
            .header(AUTHORIZATION, bearer(token));

        match self.http.send_for_data("release_status", request).await? {
            Value::String(status) => Ok(status),
            _ => Err(GatewayError::NoData),
        }
    }

    async fn create_instance(&self, graph_space: &str, content: Value, token: &str) -> GatewayResult<Value> {
        info!(space = %graph_space, "Uploading metadata to space");
        let request = self
            .http
            .client()
            .post(self.http.url("instances")?)
            .query(&[("space", graph_space)])
            .header(AUTHORIZATION, bearer(token))
            .json(&strip_meta_vocabulary(content));
        self.http.send_for_data("create_instance", request).await
    }

    async fn update_instance(&self, instance_id: Uuid, content: Value, token: &str) -> GatewayResult<Value> {
        info!(kg_instance_id = %instance_id, "Updating instance");
        let request = self
            .http
            .client()
            .put(self.http.url(&format!("instances/{instance_id}"))?)
            .header(AUTHORIZATION, bearer(token))
            .json(&strip_meta_vocabulary(content));
        self.http.send_for_data("update_instance", request).await
    }

    async fn delete_instance(&self, instance_id: Uuid, token: &str) -> GatewayResult<()> {
        info!(kg_instance_id = %instance_id, "Deleting metadata");
        let request = self
            .http
            .client()
            .delete(self.http.url(&format!("instances/{instance_id}"))?)
            .header(AUTHORIZATION, bearer(token));
        self.http.send_checked("delete_instance", request).await?;
        Ok(())
    }

    async fn current_username(&self, token: &str) -> GatewayResult<String> {
        info!("Getting user information");
        let request = self
            .http
            .client()
            .get(self.http.url("users/me")?)
            .header(AUTHORIZATION, bearer(token));
        let data = self.http.send_for_data("current_user", request).await?;

        data.get(SCHEMA_ALTERNATE_NAME)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(GatewayError::NoData)
    }
}
