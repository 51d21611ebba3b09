//! # Web API Middleware
//!
//! Layers applied to every route:
//! 1. Request tracing
//! 2. Request timeout
//! 3. Token resolution (query parameter or bearer header)

pub mod token;

use axum::middleware;
use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::web::state::AppState;

pub fn apply_middleware_stack(router: Router<AppState>, request_timeout: Duration) -> Router<AppState> {
    router
        .layer(middleware::from_fn(token::resolve_token))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}
