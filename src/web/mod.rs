//! # Web API Module
//!
//! Axum REST surface of the gateway.
//!
//! - [`handlers`]: request handlers per resource group
//! - [`middleware`]: tracing, timeout and token resolution layers
//! - [`extractors`]: the [`UserToken`](extractors::UserToken) extractor
//! - [`errors`]: `GatewayError` to JSON response mapping
//! - [`state`]: shared application state

pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;
use std::time::Duration;

pub use state::AppState;

/// Build the application router with every route and the middleware stack
pub fn build_router(app_state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/", get(handlers::health::root))
        .nest("/v1", api_v1_routes());

    middleware::apply_middleware_stack(router, request_timeout).with_state(app_state)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(space_routes())
        .merge(user_routes())
        .merge(metadata_routes())
}

fn space_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/spaces",
            get(handlers::spaces::list_spaces).post(handlers::spaces::check_spaces),
        )
        .route("/spaces/reconcile", post(handlers::spaces::reconcile_spaces))
        .route("/spaces/create", post(handlers::spaces::create_space))
        .route(
            "/spaces/create/project/:project_code",
            post(handlers::spaces::create_space_for_project),
        )
        .route(
            "/spaces/create/dataset/:dataset_code",
            post(handlers::spaces::create_space_for_dataset),
        )
        .route("/spaces/:space", get(handlers::spaces::get_space))
}

fn user_routes() -> Router<AppState> {
    // One parameter name per segment: a space name when listing, a project
    // id when changing roles
    Router::new()
        .route("/users/:key", get(handlers::users::list_users))
        .route(
            "/users/:key/:username",
            post(handlers::users::invite_user)
                .delete(handlers::users::remove_user)
                .put(handlers::users::update_user),
        )
}

fn metadata_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/metadata",
            get(handlers::metadata::list_metadata).post(handlers::metadata::check_metadata),
        )
        .route("/metadata/upload", post(handlers::metadata::upload_metadata))
        .route(
            "/metadata/upload/:kg_instance_id/:dataset_id",
            get(handlers::metadata::download_metadata),
        )
        .route(
            "/metadata/refresh/:metadata_id",
            get(handlers::metadata::refresh_metadata),
        )
        .route(
            "/metadata/refresh/dataset/:dataset_id",
            get(handlers::metadata::refresh_dataset_metadata),
        )
        .route(
            "/metadata/update/:metadata_id",
            put(handlers::metadata::update_metadata),
        )
        .route(
            "/metadata/update/dataset/:dataset_id",
            put(handlers::metadata::update_dataset_metadata),
        )
        .route(
            "/metadata/:kg_instance_id",
            get(handlers::metadata::get_metadata).delete(handlers::metadata::delete_metadata),
        )
}
