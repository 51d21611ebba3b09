//! # Token Resolution Middleware
//!
//! Callers may pass their platform token as a `token` query parameter or as
//! an `Authorization: Bearer` header. The query parameter wins; the header
//! only fills in when the query has none. The resolved token is stored in the
//! request extensions for the [`UserToken`](crate::web::extractors::UserToken)
//! extractor.

use axum::extract::{Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use tracing::debug;

/// Token found on the request, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken(pub Option<String>);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

pub async fn resolve_token(mut request: Request, next: Next) -> Response {
    let from_query = Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty());

    let token = match from_query {
        Some(token) => Some(token),
        None => bearer_from_headers(request.headers()),
    };
    debug!(present = token.is_some(), "Resolved request token");

    request.extensions_mut().insert(ResolvedToken(token));
    next.run(request).await
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}
