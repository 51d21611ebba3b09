//! # Custom Axum Extractors

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::GatewayError;
use crate::web::middleware::token::ResolvedToken;

/// Platform token of the caller, resolved by the token middleware.
/// Rejects with `TokenNotProvided` (422) when the request carried none.
#[derive(Debug, Clone)]
pub struct UserToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserToken
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<ResolvedToken>() {
            Some(ResolvedToken(Some(token))) => Ok(Self(token.clone())),
            _ => Err(GatewayError::TokenNotProvided),
        }
    }
}
