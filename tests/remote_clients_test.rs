//! HTTP-level behaviour of the remote service clients against a mock server.

use serde_json::json;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kg_integration::clients::{
    CollabClient, CollabRole, CollabWorkspace, CreateOutcome, DatasetCatalog, DatasetClient,
    IdentityBroker, KeycloakClient, KnowledgeGraph, KnowledgeGraphClient, ServiceHttp,
};
use kg_integration::config::Settings;
use kg_integration::error::GatewayError;
use kg_integration::models::Stage;
use kg_integration::resilience::RetryPolicy;

const TIMEOUT: Duration = Duration::from_secs(2);

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_millis(1))
}

fn graph_client(server: &MockServer) -> KnowledgeGraphClient {
    let http = ServiceHttp::new("knowledge_graph", &format!("{}/v3/", server.uri()), TIMEOUT).unwrap();
    KnowledgeGraphClient::new(http, fast_retry())
}

fn collab_client(server: &MockServer) -> CollabClient {
    let http = ServiceHttp::new("collab", &format!("{}/", server.uri()), TIMEOUT).unwrap();
    CollabClient::new(http, fast_retry(), RetryPolicy::new(3, Duration::from_millis(1)))
}

fn dataset_client(server: &MockServer) -> DatasetClient {
    let http = ServiceHttp::new("dataset", &format!("{}/v1/", server.uri()), TIMEOUT).unwrap();
    DatasetClient::new(http)
}

fn keycloak_client(server: &MockServer) -> KeycloakClient {
    let mut settings = Settings::default();
    settings.keycloak.url = server.uri();
    settings.keycloak.external_url = server.uri();
    settings.keycloak.realm = "hdc".to_string();
    settings.keycloak.broker = "ebrains".to_string();
    settings.retry.base_delay_ms = 1;
    settings.retry.max_attempts = 5;
    KeycloakClient::from_settings(&settings).unwrap()
}

#[tokio::test]
async fn test_space_creation_is_retried_up_to_the_cap() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v3/spaces/collab-hdc-ds1/specification"))
        .respond_with(ResponseTemplate::new(502))
        .expect(5)
        .mount(&server)
        .await;

    let result = graph_client(&server).create_space("collab-hdc-ds1", "token").await;
    assert!(matches!(result, Err(GatewayError::Unhandled(_))));
}

#[tokio::test]
async fn test_space_creation_recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v3/spaces/collab-hdc-ds1/specification"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v3/spaces/collab-hdc-ds1/specification"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    graph_client(&server)
        .create_space("collab-hdc-ds1", "token")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_data_envelope_is_no_data() {
    let server = MockServer::start().await;
    let instance = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/v3/instances/{instance}")))
        .and(query_param("stage", "IN_PROGRESS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .mount(&server)
        .await;

    let result = graph_client(&server)
        .get_instance(instance, Stage::InProgress, "token")
        .await;
    assert_eq!(result.unwrap_err(), GatewayError::NoData);
}

#[tokio::test]
async fn test_upstream_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    let instance = Uuid::new_v4();
    Mock::given(method("DELETE"))
        .and(path(format!("/v3/instances/{instance}")))
        .respond_with(ResponseTemplate::new(403).set_body_string("not allowed in space"))
        .mount(&server)
        .await;

    let result = graph_client(&server).delete_instance(instance, "token").await;
    assert_eq!(
        result.unwrap_err(),
        GatewayError::remote(403, "not allowed in space")
    );
}

#[tokio::test]
async fn test_meta_vocabulary_is_stripped_before_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/instances"))
        .and(query_param("space", "collab-hdc-ds1"))
        .and(body_partial_json(json!({"http://schema.org/name": "x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"@id": "id"}})))
        .mount(&server)
        .await;

    let content = json!({
        "http://schema.org/name": "x",
        "https://core.kg.ebrains.eu/vocab/meta/revision": "_rev"
    });
    let data = graph_client(&server)
        .create_instance("collab-hdc-ds1", content, "token")
        .await
        .unwrap();
    assert_eq!(data["@id"], "id");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("https://core.kg.ebrains.eu/vocab/meta/revision").is_none());
}

#[tokio::test]
async fn test_current_username_reads_alternate_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"http://schema.org/alternateName": "jdoe"}
        })))
        .mount(&server)
        .await;

    let username = graph_client(&server).current_username("token").await.unwrap();
    assert_eq!(username, "jdoe");
}

#[tokio::test]
async fn test_existing_collab_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/collabs"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = collab_client(&server)
        .ensure_collab_created("hdc-ds1", "token")
        .await
        .unwrap();
    assert_eq!(outcome, CreateOutcome::AlreadyExisted);
}

#[tokio::test]
async fn test_new_collab_waits_for_its_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/collabs"))
        .and(body_partial_json(json!({"name": "hdc-ds1", "drive": true, "public": false})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"collabCreationKeycloakJob": "job-7"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobstatus/job-7"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobstatus/job-7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = collab_client(&server)
        .ensure_collab_created("hdc-ds1", "token")
        .await
        .unwrap();
    assert!(outcome.was_created());
}

#[tokio::test]
async fn test_existing_team_member_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/collabs/hdc-ds1/team/editor/users/alice"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    collab_client(&server)
        .add_user("hdc-ds1", CollabRole::Editor, "alice", "token")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_token_exchange_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/realms/hdc/broker/ebrains/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_token"))
        .expect(1)
        .mount(&server)
        .await;

    let result = keycloak_client(&server).exchange_token("expired").await;
    assert!(matches!(result, Err(GatewayError::TokenExchangeFailed(_))));
}

#[tokio::test]
async fn test_token_exchange_returns_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/realms/hdc/broker/ebrains/token"))
        .and(header("authorization", "Bearer platform"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "ebrains"})))
        .mount(&server)
        .await;

    let token = keycloak_client(&server).exchange_token("platform").await.unwrap();
    assert_eq!(token, "ebrains");
}

#[tokio::test]
async fn test_service_account_token_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/realms/hbp/protocol/openid-connect/token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(5)
        .mount(&server)
        .await;

    let result = keycloak_client(&server).service_account_token().await;
    assert!(matches!(result, Err(GatewayError::TokenExchangeFailed(_))));
}

#[tokio::test]
async fn test_dataset_without_project_is_no_project() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/datasets/orphan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "orphan", "project_id": null})))
        .mount(&server)
        .await;

    let result = dataset_client(&server).project_id("orphan").await;
    assert_eq!(result.unwrap_err(), GatewayError::NoProject);
}

#[tokio::test]
async fn test_openminds_template_is_found_by_name() {
    let server = MockServer::start().await;
    let template = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/v1/dataset/default/schemaTPL/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"geid": Uuid::new_v4(), "name": "Distribution"},
                {"geid": template, "name": "Open_minds"}
            ]
        })))
        .mount(&server)
        .await;

    let found = dataset_client(&server).openminds_template_id().await.unwrap();
    assert_eq!(found, template);
}

#[tokio::test]
async fn test_unreachable_service_is_not_available() {
    let http = ServiceHttp::new("dataset", "http://127.0.0.1:9/v1/", TIMEOUT).unwrap();
    let result = DatasetClient::new(http).dataset_code(Uuid::new_v4()).await;
    assert!(matches!(result, Err(GatewayError::NotAvailable(_))));
}
