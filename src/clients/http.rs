//! # Response Normalization
//!
//! Every remote client sends its requests through [`ServiceHttp`] so that
//! upstream failures surface the same way regardless of the service:
//!
//! - transport failures and timeouts become [`GatewayError::NotAvailable`]
//! - 4xx/5xx answers become [`GatewayError::RemoteService`] with the raw body
//! - successful answers lacking a `data` envelope become [`GatewayError::NoData`]

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{GatewayError, GatewayResult};
use crate::logging::log_remote_call;

/// Result of an idempotent creation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<T> {
    Created(T),
    /// Upstream answered 409, the resource was already there
    AlreadyExisted,
}

impl<T> CreateOutcome<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// HTTP plumbing shared by one remote service client
#[derive(Debug, Clone)]
pub struct ServiceHttp {
    service: &'static str,
    client: Client,
    base_url: Url,
}

impl ServiceHttp {
    pub fn new(service: &'static str, base_url: &str, timeout: Duration) -> GatewayResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            GatewayError::Configuration(format!("Invalid base URL '{base_url}' for {service}: {e}"))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("kg-integration/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GatewayError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            service,
            client,
            base_url,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn url(&self, path: &str) -> GatewayResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::unhandled(format!("Invalid URL path '{path}': {e}")))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send the request, mapping transport failures to `NotAvailable`
    pub async fn send(&self, operation: &str, request: RequestBuilder) -> GatewayResult<Response> {
        match request.send().await {
            Ok(response) => {
                log_remote_call(self.service, operation, response.status().as_str(), None);
                Ok(response)
            }
            Err(e) => {
                error!(service = self.service, operation, error = %e, "Remote call failed");
                Err(GatewayError::NotAvailable(format!("{}: {e}", self.service)))
            }
        }
    }

    /// Send the request and reject 4xx/5xx answers
    pub async fn send_checked(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> GatewayResult<Response> {
        let response = self.send(operation, request).await?;
        check_response_error(response).await
    }

    /// Send the request and unwrap the `data` envelope of the answer
    pub async fn send_for_data(&self, operation: &str, request: RequestBuilder) -> GatewayResult<Value> {
        let response = self.send_checked(operation, request).await?;
        let body = read_json(response).await?;
        extract_data(body)
    }

    /// Send the request and return the whole JSON body of a successful answer
    pub async fn send_for_json(&self, operation: &str, request: RequestBuilder) -> GatewayResult<Value> {
        let response = self.send_checked(operation, request).await?;
        read_json(response).await
    }
}

pub async fn check_response_error(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let details = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), details = %details, "Remote service returned an error");
        return Err(GatewayError::remote(status.as_u16(), details));
    }
    Ok(response)
}

pub async fn read_json(response: Response) -> GatewayResult<Value> {
    response.json::<Value>().await.map_err(|_| GatewayError::NoData)
}

pub fn extract_data(mut body: Value) -> GatewayResult<Value> {
    match body.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => Err(GatewayError::NoData),
        Some(data) => Ok(data),
    }
}

pub fn is_conflict(response: &Response) -> bool {
    response.status() == StatusCode::CONFLICT
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_data_requires_envelope() {
        assert_eq!(extract_data(json!({"data": [1, 2]})), Ok(json!([1, 2])));
        assert_eq!(extract_data(json!({"result": []})), Err(GatewayError::NoData));
        assert_eq!(extract_data(json!({"data": null})), Err(GatewayError::NoData));
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let result = ServiceHttp::new("kg", "not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }
}
