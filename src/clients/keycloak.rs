//! Keycloak identity broker client.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use tracing::{error, info};

use super::http::{bearer, ServiceHttp};
use super::IdentityBroker;
use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};
use crate::resilience::{retry_with_backoff, RetryOn, RetryPolicy};

const SERVICE_ACCOUNT_SCOPE: &str = "openid group roles team email profile";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Clone)]
pub struct KeycloakClient {
    /// Platform realm, used for broker token exchange
    platform: ServiceHttp,
    /// EBRAINS realm, used for service-account credentials
    external: ServiceHttp,
    exchange_path: String,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
}

impl KeycloakClient {
    pub fn from_settings(settings: &Settings) -> GatewayResult<Self> {
        let timeout = settings.external_timeout();
        Ok(Self {
            platform: ServiceHttp::new("keycloak", &settings.keycloak_url(), timeout)?,
            external: ServiceHttp::new("keycloak-ebrains", &settings.keycloak_external_url(), timeout)?,
            exchange_path: format!(
                "realms/{}/broker/{}/token",
                settings.keycloak.realm, settings.keycloak.broker
            ),
            client_id: settings.keycloak.service_account_id.clone(),
            client_secret: settings.keycloak.service_account_secret.clone(),
            retry: RetryPolicy::standard(&settings.retry),
        })
    }

    async fn request_service_account_token(&self) -> GatewayResult<String> {
        let url = self.external.url("realms/hbp/protocol/openid-connect/token")?;
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", SERVICE_ACCOUNT_SCOPE),
        ];
        let request = self.external.client().post(url).form(&form);
        let response = self.external.send("service_account_token", request).await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Could not get the service account token");
            return Err(GatewayError::TokenExchangeFailed(format!(
                "Could not get the service account token, error: {body}"
            )));
        }

        access_token(response).await
    }
}

async fn access_token(response: reqwest::Response) -> GatewayResult<String> {
    let body: TokenResponse = response.json().await.map_err(|_| GatewayError::NoData)?;
    body.access_token.ok_or(GatewayError::NoData)
}

#[async_trait]
impl IdentityBroker for KeycloakClient {
    async fn exchange_token(&self, token: &str) -> GatewayResult<String> {
        info!("Exchanging token");
        let url = self.platform.url(&self.exchange_path)?;
        let request = self
            .platform
            .client()
            .get(url)
            .header(reqwest::header::AUTHORIZATION, bearer(token));
        let response = self.platform.send("exchange_token", request).await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Token exchange failed");
            return Err(GatewayError::TokenExchangeFailed(format!(
                "Could not exchange the token, error: {body}"
            )));
        }

        access_token(response).await
    }

    async fn service_account_token(&self) -> GatewayResult<String> {
        info!("Getting service account token");
        retry_with_backoff(
            &self.retry,
            "service_account_token",
            RetryOn::TokenExchange,
            || self.request_service_account_token(),
        )
        .await
    }
}

impl fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("platform", &self.platform)
            .field("external", &self.external)
            .field("exchange_path", &self.exchange_path)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}
