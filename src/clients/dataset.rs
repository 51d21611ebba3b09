//! Dataset catalog service client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::http::ServiceHttp;
use super::DatasetCatalog;
use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};
use crate::models::graph::instance_id_from;

/// Name of the catalog template used for openMINDS metadata
pub const OPENMINDS_TEMPLATE: &str = "Open_minds";

const SCHEMA_EXTENSION: &str = ".jsonld";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchemaTemplate {
    pub geid: Uuid,
    pub name: String,
}

/// Schema stored in a dataset
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetSchema {
    pub geid: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSchema {
    pub name: String,
    pub dataset_geid: Uuid,
    pub tpl_geid: Uuid,
    pub standard: String,
    pub system_defined: bool,
    pub is_draft: bool,
    pub content: Value,
    pub creator: String,
}

impl NewSchema {
    /// openMINDS schema holding a graph instance. Without a filename the
    /// instance id is used; the name always ends with `.jsonld`.
    pub fn openminds(
        dataset_id: Uuid,
        template_id: Uuid,
        creator: &str,
        filename: Option<&str>,
        content: Value,
    ) -> GatewayResult<Self> {
        let name = match filename {
            Some(filename) => filename.to_string(),
            None => {
                let at_id = content
                    .get("@id")
                    .and_then(Value::as_str)
                    .ok_or(GatewayError::NoData)?;
                instance_id_from(at_id)?.to_string()
            }
        };
        let name = if name.ends_with(SCHEMA_EXTENSION) {
            name
        } else {
            format!("{name}{SCHEMA_EXTENSION}")
        };

        Ok(Self {
            name,
            dataset_geid: dataset_id,
            tpl_geid: template_id,
            standard: "open_minds".to_string(),
            system_defined: false,
            is_draft: false,
            content,
            creator: creator.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatasetClient {
    http: ServiceHttp,
}

impl DatasetClient {
    pub fn new(http: ServiceHttp) -> Self {
        Self { http }
    }

    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let base = format!("{}/v1/", settings.services.dataset_url.trim_end_matches('/'));
        Ok(Self::new(ServiceHttp::new(
            "dataset",
            &base,
            settings.external_timeout(),
        )?))
    }

    async fn get_dataset(&self, key: &str) -> GatewayResult<Value> {
        let request = self.http.client().get(self.http.url(&format!("datasets/{key}"))?);
        self.http.send_for_json("get_dataset", request).await
    }
}

fn take_result(mut body: Value) -> GatewayResult<Value> {
    match body.get_mut("result").map(Value::take) {
        Some(Value::Null) | None => Err(GatewayError::NoData),
        Some(result) => Ok(result),
    }
}

fn parse_result<T: serde::de::DeserializeOwned>(body: Value) -> GatewayResult<T> {
    serde_json::from_value(take_result(body)?).map_err(|_| GatewayError::NoData)
}

#[async_trait]
impl DatasetCatalog for DatasetClient {
    async fn project_id(&self, dataset_code: &str) -> GatewayResult<Uuid> {
        info!(dataset_code = %dataset_code, "Getting project id from dataset code");
        let dataset = self.get_dataset(dataset_code).await?;

        match dataset.get("project_id").and_then(Value::as_str) {
            Some(project_id) if !project_id.is_empty() => {
                Uuid::parse_str(project_id).map_err(|_| GatewayError::NoProject)
            }
            _ => Err(GatewayError::NoProject),
        }
    }

    async fn dataset_code(&self, dataset_id: Uuid) -> GatewayResult<String> {
        info!(dataset_id = %dataset_id, "Getting dataset code from dataset id");
        let dataset = self.get_dataset(&dataset_id.to_string()).await?;
        dataset
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(GatewayError::NoData)
    }

    async fn project_dataset_codes(&self, project_id: Uuid) -> GatewayResult<Vec<String>> {
        info!(project_id = %project_id, "Getting all datasets of project");
        let request = self
            .http
            .client()
            .get(self.http.url("datasets/")?)
            .query(&[
                ("project_id", project_id.to_string()),
                ("page_size", "10000".to_string()),
            ]);
        let body = self.http.send_for_json("project_datasets", request).await?;

        #[derive(Deserialize)]
        struct DatasetSummary {
            code: String,
        }
        let datasets: Vec<DatasetSummary> = parse_result(body)?;
        Ok(datasets.into_iter().map(|d| d.code).collect())
    }

    async fn schema_templates(&self) -> GatewayResult<Vec<SchemaTemplate>> {
        info!("Getting all metadata templates");
        let request = self
            .http
            .client()
            .post(self.http.url("dataset/default/schemaTPL/list")?)
            .json(&json!({}));
        let body = self.http.send_for_json("schema_templates", request).await?;
        parse_result(body)
    }

    async fn create_schema(&self, schema: NewSchema) -> GatewayResult<Value> {
        info!(dataset_id = %schema.dataset_geid, name = %schema.name, "Uploading metadata to dataset");
        let request = self.http.client().post(self.http.url("schema")?).json(&schema);
        let body = self.http.send_for_json("create_schema", request).await?;
        take_result(body)
    }

    async fn update_schema(&self, schema_id: Uuid, username: &str, content: Value) -> GatewayResult<Value> {
        info!(metadata_id = %schema_id, "Updating metadata schema");
        let request = self
            .http
            .client()
            .put(self.http.url(&format!("schema/{schema_id}"))?)
            .json(&json!({
                "username": username,
                "activity": [],
                "content": content,
            }));
        let body = self.http.send_for_json("update_schema", request).await?;
        take_result(body)
    }

    async fn dataset_schemas(&self, dataset_id: Uuid) -> GatewayResult<Vec<DatasetSchema>> {
        info!(dataset_id = %dataset_id, "Getting all schemas of dataset");
        let request = self
            .http
            .client()
            .post(self.http.url("schema/list")?)
            .json(&json!({ "dataset_geid": dataset_id }));
        let body = self.http.send_for_json("dataset_schemas", request).await?;
        parse_result(body)
    }
}
