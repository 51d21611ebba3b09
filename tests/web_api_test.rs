//! Routing, token resolution and error envelopes of the HTTP API.

mod common;

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use common::{TestGateway, SERVICE_TOKEN, USER_TOKEN};
use kg_integration::models::{NewSpaceRecord, SpaceScope, SpaceStatus};
use kg_integration::web::build_router;

fn router(gateway: &TestGateway) -> Router {
    build_router(gateway.state.clone(), Duration::from_secs(5))
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_root_reports_version() {
    let gateway = TestGateway::new();
    let response = router(&gateway)
        .oneshot(request(Method::GET, "/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Service KG Integration On, Version: "));
}

#[tokio::test]
async fn test_health_with_reachable_store_is_no_content() {
    let gateway = TestGateway::new();
    let response = router(&gateway)
        .oneshot(request(Method::GET, "/v1/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_missing_token_is_rejected_with_error_envelope() {
    let gateway = TestGateway::new();
    let response = router(&gateway)
        .oneshot(request(Method::GET, "/v1/users/ds1?role=viewer"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "global.no_token");
    assert!(gateway.remote.calls().is_empty());
}

#[tokio::test]
async fn test_query_token_takes_precedence_over_header() {
    let gateway = TestGateway::new();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/users/ds1?role=viewer&token=query-token")
        .header(header::AUTHORIZATION, "Bearer header-token")
        .body(Body::empty())
        .unwrap();

    let response = router(&gateway).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        gateway.remote.calls_to("exchange_token"),
        vec!["exchange_token:query-token".to_string()]
    );
}

#[tokio::test]
async fn test_bearer_header_is_used_without_query_token() {
    let gateway = TestGateway::new();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/users/ds1?role=editor")
        .header(header::AUTHORIZATION, format!("Bearer {USER_TOKEN}"))
        .body(Body::empty())
        .unwrap();

    let response = router(&gateway).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["users"][0]["id"], "jdoe");
    assert_eq!(
        gateway.remote.calls_to("exchange_token"),
        vec![format!("exchange_token:{USER_TOKEN}")]
    );
}

#[tokio::test]
async fn test_unknown_space_is_not_found() {
    let gateway = TestGateway::new();
    let response = router(&gateway)
        .oneshot(request(Method::GET, "/v1/spaces/unknown"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "global.not_found");
}

#[tokio::test]
async fn test_standalone_space_creation_returns_created() {
    let gateway = TestGateway::new();
    let response = router(&gateway)
        .oneshot(request(Method::POST, "/v1/spaces/create?name=shared&username=jane"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    gateway.settle().await;
    let stored = gateway.state.provisioner.get_space("shared").await.unwrap();
    assert_eq!(stored.status, SpaceStatus::Provisioned);

    let again = router(&gateway)
        .oneshot(request(Method::POST, "/v1/spaces/create?name=shared&username=jane"))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(again).await["error"]["code"], "global.already_exists");
}

#[tokio::test]
async fn test_invite_is_accepted_and_runs_in_background() {
    let gateway = TestGateway::new();
    gateway
        .remote
        .configure(|state| state.project_dataset_codes = vec!["ds1".to_string()]);
    gateway
        .stores
        .spaces
        .insert(NewSpaceRecord::new("ds1", "jane", SpaceScope::Dataset))
        .await
        .unwrap();

    let uri = format!("/v1/users/{}/alice?role=editor", Uuid::new_v4());
    let response = router(&gateway)
        .oneshot(request(Method::POST, &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    gateway.settle().await;
    assert_eq!(
        gateway.remote.calls_to("add_user"),
        vec![format!("add_user:hdc-ds1/editor/alice/{SERVICE_TOKEN}")]
    );
}

#[tokio::test]
async fn test_check_spaces_returns_existing_names() {
    let gateway = TestGateway::new();
    gateway
        .stores
        .spaces
        .insert(NewSpaceRecord::new("ds1", "jane", SpaceScope::Dataset))
        .await
        .unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/spaces")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"spaces": [{"name": "ds1"}, {"name": "ds2"}]}"#))
        .unwrap();
    let response = router(&gateway).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let names: Vec<&str> = body["spaces"]
        .as_array()
        .unwrap()
        .iter()
        .map(|space| space["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ds1"]);
}
