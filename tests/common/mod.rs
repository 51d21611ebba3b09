//! Shared test doubles for the gateway integration tests.
//!
//! [`MockRemote`] implements every remote collaborator seam plus the
//! activity sink over one shared, call-recording state, so tests can assert
//! the exact cross-service order of a workflow.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use kg_integration::clients::{
    AuthDirectory, CollabRole, CollabWorkspace, CreateOutcome, DatasetCatalog, DatasetSchema,
    IdentityBroker, KnowledgeGraph, NewSchema, ProjectDirectory, ProjectMember, SchemaTemplate,
    OPENMINDS_TEMPLATE,
};
use kg_integration::config::Settings;
use kg_integration::error::{GatewayError, GatewayResult};
use kg_integration::events::{ActivityLog, ActivityRecord, ActivitySink};
use kg_integration::execution::BackgroundDispatcher;
use kg_integration::models::graph::INSTANCE_ID_PREFIX;
use kg_integration::models::{GraphSpace, Stage};
use kg_integration::orchestration::RemoteServices;
use kg_integration::store::RecordStores;
use kg_integration::web::AppState;

pub const USER_TOKEN: &str = "platform-token";
pub const EXTERNAL_TOKEN: &str = "ebrains-token";
pub const SERVICE_TOKEN: &str = "service-token";
pub const CURRENT_USER: &str = "jdoe";

/// Recorded calls and canned answers shared by every mock seam
#[derive(Debug)]
pub struct MockState {
    /// `operation:argument` entries in call order
    pub calls: Vec<String>,
    /// Operation name -> error returned instead of the canned answer
    pub failures: HashMap<String, GatewayError>,
    pub collab_exists: bool,
    pub project_members: Vec<ProjectMember>,
    pub project_id: Uuid,
    pub project_code: String,
    pub dataset_code: String,
    pub project_dataset_codes: Vec<String>,
    pub dataset_schemas: Vec<DatasetSchema>,
    pub graph_spaces: Vec<String>,
    pub release_status: String,
    pub instance_content: Value,
    pub created_instances: Vec<Uuid>,
    pub created_schemas: Vec<Uuid>,
    pub activity: Vec<ActivityRecord>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            failures: HashMap::new(),
            collab_exists: false,
            project_members: Vec::new(),
            project_id: Uuid::new_v4(),
            project_code: "indoctestproject".to_string(),
            dataset_code: "testdataset".to_string(),
            project_dataset_codes: Vec::new(),
            dataset_schemas: Vec::new(),
            graph_spaces: Vec::new(),
            release_status: "UNRELEASED".to_string(),
            instance_content: json!({"@type": ["https://openminds.ebrains.eu/core/Person"]}),
            created_instances: Vec::new(),
            created_schemas: Vec::new(),
            activity: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the canned answers
    pub fn configure(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock());
    }

    /// Make `operation` fail with `error` from now on
    pub fn fail(&self, operation: &str, error: GatewayError) {
        self.state.lock().failures.insert(operation.to_string(), error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation}:");
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(&prefix))
            .collect()
    }

    pub fn activity(&self) -> Vec<ActivityRecord> {
        self.state.lock().activity.clone()
    }

    pub fn created_instances(&self) -> Vec<Uuid> {
        self.state.lock().created_instances.clone()
    }

    pub fn services(&self) -> RemoteServices {
        RemoteServices {
            identity: Arc::new(self.clone()),
            graph: Arc::new(self.clone()),
            collab: Arc::new(self.clone()),
            datasets: Arc::new(self.clone()),
            projects: Arc::new(self.clone()),
            auth: Arc::new(self.clone()),
        }
    }

    pub fn activity_log(&self) -> ActivityLog {
        ActivityLog::new(Arc::new(self.clone()))
    }

    fn record(&self, operation: &str, argument: impl std::fmt::Display) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("{operation}:{argument}"));
        match state.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Graph-store payload for an instance as the v3 API returns it
pub fn kg_instance_payload(id: Uuid, space: &str) -> Value {
    json!({
        "@id": format!("{INSTANCE_ID_PREFIX}{id}"),
        "@type": ["https://openminds.ebrains.eu/core/Person"],
        "http://schema.org/identifier": [format!("{INSTANCE_ID_PREFIX}{id}")],
        "https://core.kg.ebrains.eu/vocab/meta/user": {"@id": format!("{INSTANCE_ID_PREFIX}{}", Uuid::nil())},
        "https://core.kg.ebrains.eu/vocab/meta/space": space,
        "https://core.kg.ebrains.eu/vocab/meta/revision": "_rev1",
        "http://schema.org/familyName": "Doe"
    })
}

#[async_trait]
impl IdentityBroker for MockRemote {
    async fn exchange_token(&self, token: &str) -> GatewayResult<String> {
        self.record("exchange_token", token)?;
        Ok(EXTERNAL_TOKEN.to_string())
    }

    async fn service_account_token(&self) -> GatewayResult<String> {
        self.record("service_account_token", "-")?;
        Ok(SERVICE_TOKEN.to_string())
    }
}

#[async_trait]
impl KnowledgeGraph for MockRemote {
    async fn list_spaces(&self, token: &str) -> GatewayResult<Vec<GraphSpace>> {
        self.record("list_spaces", token)?;
        Ok(self
            .state
            .lock()
            .graph_spaces
            .iter()
            .map(|name| GraphSpace { name: name.clone() })
            .collect())
    }

    async fn create_space(&self, graph_space: &str, _token: &str) -> GatewayResult<()> {
        self.record("create_space", graph_space)
    }

    async fn list_instances(
        &self,
        graph_space: &str,
        stage: Stage,
        instance_type: &str,
        _token: &str,
    ) -> GatewayResult<Vec<Value>> {
        self.record(
            "list_instances",
            format!("{graph_space}/{}/{instance_type}", stage.as_str()),
        )?;
        Ok(vec![
            kg_instance_payload(Uuid::new_v4(), graph_space),
            kg_instance_payload(Uuid::new_v4(), graph_space),
        ])
    }

    async fn get_instance(&self, instance_id: Uuid, stage: Stage, _token: &str) -> GatewayResult<Value> {
        self.record("get_instance", format!("{instance_id}/{}", stage.as_str()))?;
        let mut content = self.state.lock().instance_content.clone();
        if let Value::Object(map) = &mut content {
            map.insert(
                "@id".to_string(),
                Value::String(format!("{INSTANCE_ID_PREFIX}{instance_id}")),
            );
        }
        Ok(content)
    }

    async fn release_status(&self, instance_id: Uuid, _token: &str) -> GatewayResult<String> {
        self.record("release_status", instance_id)?;
        Ok(self.state.lock().release_status.clone())
    }

    async fn create_instance(&self, graph_space: &str, _content: Value, _token: &str) -> GatewayResult<Value> {
        self.record("create_instance", graph_space)?;
        let id = Uuid::new_v4();
        self.state.lock().created_instances.push(id);
        Ok(kg_instance_payload(id, graph_space))
    }

    async fn update_instance(&self, instance_id: Uuid, _content: Value, _token: &str) -> GatewayResult<Value> {
        self.record("update_instance", instance_id)?;
        Ok(kg_instance_payload(instance_id, "collab-hdc-testdataset"))
    }

    async fn delete_instance(&self, instance_id: Uuid, _token: &str) -> GatewayResult<()> {
        self.record("delete_instance", instance_id)
    }

    async fn current_username(&self, token: &str) -> GatewayResult<String> {
        self.record("current_username", token)?;
        Ok(CURRENT_USER.to_string())
    }
}

#[async_trait]
impl CollabWorkspace for MockRemote {
    async fn create_collab(&self, collab: &str, _token: &str) -> GatewayResult<CreateOutcome<Option<String>>> {
        self.record("create_collab", collab)?;
        let mut state = self.state.lock();
        if state.collab_exists {
            return Ok(CreateOutcome::AlreadyExisted);
        }
        state.collab_exists = true;
        Ok(CreateOutcome::Created(Some("job-1".to_string())))
    }

    async fn wait_for_job(&self, job: &str, _token: &str) -> GatewayResult<()> {
        self.record("wait_for_job", job)
    }

    async fn add_user(&self, collab: &str, role: CollabRole, username: &str, token: &str) -> GatewayResult<()> {
        self.record("add_user", format!("{collab}/{role}/{username}/{token}"))
    }

    async fn remove_user(&self, collab: &str, role: CollabRole, username: &str, token: &str) -> GatewayResult<()> {
        self.record("remove_user", format!("{collab}/{role}/{username}/{token}"))
    }

    async fn list_team(&self, collab: &str, role: CollabRole, _token: &str) -> GatewayResult<Value> {
        self.record("list_team", format!("{collab}/{role}"))?;
        Ok(json!({"users": [{"id": CURRENT_USER}], "groups": []}))
    }
}

#[async_trait]
impl DatasetCatalog for MockRemote {
    async fn project_id(&self, dataset_code: &str) -> GatewayResult<Uuid> {
        self.record("project_id", dataset_code)?;
        Ok(self.state.lock().project_id)
    }

    async fn dataset_code(&self, dataset_id: Uuid) -> GatewayResult<String> {
        self.record("dataset_code", dataset_id)?;
        Ok(self.state.lock().dataset_code.clone())
    }

    async fn project_dataset_codes(&self, project_id: Uuid) -> GatewayResult<Vec<String>> {
        self.record("project_dataset_codes", project_id)?;
        Ok(self.state.lock().project_dataset_codes.clone())
    }

    async fn schema_templates(&self) -> GatewayResult<Vec<SchemaTemplate>> {
        self.record("schema_templates", "-")?;
        Ok(vec![SchemaTemplate {
            geid: Uuid::nil(),
            name: OPENMINDS_TEMPLATE.to_string(),
        }])
    }

    async fn create_schema(&self, schema: NewSchema) -> GatewayResult<Value> {
        self.record("create_schema", &schema.name)?;
        let geid = Uuid::new_v4();
        self.state.lock().created_schemas.push(geid);
        Ok(json!({"geid": geid.to_string(), "name": schema.name, "content": schema.content}))
    }

    async fn update_schema(&self, schema_id: Uuid, username: &str, content: Value) -> GatewayResult<Value> {
        self.record("update_schema", format!("{schema_id}/{username}"))?;
        Ok(json!({"geid": schema_id.to_string(), "name": "person.jsonld", "content": content}))
    }

    async fn dataset_schemas(&self, dataset_id: Uuid) -> GatewayResult<Vec<DatasetSchema>> {
        self.record("dataset_schemas", dataset_id)?;
        Ok(self.state.lock().dataset_schemas.clone())
    }
}

#[async_trait]
impl ProjectDirectory for MockRemote {
    async fn project_code(&self, project_id: Uuid) -> GatewayResult<String> {
        self.record("project_code", project_id)?;
        Ok(self.state.lock().project_code.clone())
    }
}

#[async_trait]
impl AuthDirectory for MockRemote {
    async fn project_members(&self, project_code: &str) -> GatewayResult<Vec<ProjectMember>> {
        self.record("project_members", project_code)?;
        Ok(self.state.lock().project_members.clone())
    }
}

#[async_trait]
impl ActivitySink for MockRemote {
    async fn publish(&self, record: ActivityRecord) {
        self.state.lock().activity.push(record);
    }
}

/// Gateway wired over [`MockRemote`] and the in-memory record store
pub struct TestGateway {
    pub remote: MockRemote,
    pub stores: RecordStores,
    pub dispatcher: BackgroundDispatcher,
    pub state: AppState,
}

impl TestGateway {
    /// Requires a tokio runtime
    pub fn new() -> Self {
        let remote = MockRemote::new();
        let stores = RecordStores::in_memory();
        let dispatcher = BackgroundDispatcher::new();
        let state = AppState::new(
            &Settings::default(),
            remote.services(),
            stores.clone(),
            dispatcher.clone(),
            remote.activity_log(),
        );
        Self {
            remote,
            stores,
            dispatcher,
            state,
        }
    }

    /// Wait for every background continuation to finish
    pub async fn settle(&self) {
        self.dispatcher.wait_idle().await;
    }
}
