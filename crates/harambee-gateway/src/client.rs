// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the payment gateway.
//!
//! Provides [`GatewayClient`], which builds the two requests the bot makes
//! (payment initiation and status query) and maps transport failures into
//! [`HarambeeError::Gateway`]. Nothing here retries: the verification loop
//! owns the polling cadence.

use std::time::Duration;

use harambee_config::model::GatewayConfig;
use harambee_core::HarambeeError;
use harambee_core::types::now_timestamp;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{InitiatePayload, InitiateReply, StatusPayload};

/// Path of the status endpoint under `status_base_url`.
const STATUS_PATH: &str = "/api/verify_payment";

/// Raw outcome of an HTTP exchange: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub http_status: u16,
    pub body: String,
}

/// HTTP client for gateway communication.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    payments_url: String,
    status_url: String,
    basic_auth: Option<HeaderValue>,
    status_key: Option<HeaderValue>,
}

impl GatewayClient {
    /// Creates a client from the gateway configuration.
    ///
    /// Credentials are optional here; a request that needs a missing one
    /// fails with [`HarambeeError::Config`].
    pub fn new(config: &GatewayConfig) -> Result<Self, HarambeeError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HarambeeError::Gateway {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let basic_auth = config
            .api_key
            .as_deref()
            .map(|key| header_value("gateway.api_key", &basic_credentials(key)))
            .transpose()?;
        let status_key = config
            .auth_token
            .as_deref()
            .map(|token| header_value("gateway.auth_token", token))
            .transpose()?;

        Ok(Self {
            client,
            payments_url: config.payments_url.clone(),
            status_url: format!(
                "{}{STATUS_PATH}",
                config.status_base_url.trim_end_matches('/')
            ),
            basic_auth,
            status_key,
        })
    }

    /// Posts a payment initiation request and decodes the reply.
    ///
    /// Non-2xx answers and replies without `success: true` are errors.
    pub async fn initiate(
        &self,
        payload: &InitiatePayload<'_>,
    ) -> Result<InitiateReply, HarambeeError> {
        let auth = self.basic_auth.clone().ok_or_else(|| {
            HarambeeError::Config("gateway.api_key is required to initiate payments".into())
        })?;

        let response = self
            .client
            .post(&self.payments_url)
            .header(AUTHORIZATION, auth)
            .json(payload)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        debug!(status = %status, reference = payload.external_reference, "initiation response received");
        let body = response.text().await.map_err(request_failed)?;
        if !status.is_success() {
            return Err(HarambeeError::gateway(format!(
                "initiation returned {status}: {body}"
            )));
        }

        let reply: InitiateReply =
            serde_json::from_str(&body).map_err(|e| HarambeeError::Gateway {
                message: format!("failed to parse initiation reply: {e}"),
                source: Some(Box::new(e)),
            })?;
        if !reply.success {
            return Err(HarambeeError::gateway(
                reply
                    .message
                    .unwrap_or_else(|| "payment request failed".to_string()),
            ));
        }
        Ok(reply)
    }

    /// Posts a status query for `reference` and returns the raw reply.
    ///
    /// Only transport failures are errors here; the caller decides what a
    /// given status code means.
    pub async fn query_status(&self, reference: &str) -> Result<RawReply, HarambeeError> {
        let key = self.status_key.clone().ok_or_else(|| {
            HarambeeError::Config("gateway.auth_token is required to query payment status".into())
        })?;
        let payload = StatusPayload {
            checkout_request_id: reference,
            reference,
            timestamp: now_timestamp(),
        };

        let response = self
            .client
            .post(&self.status_url)
            .header("X-API-KEY", key)
            .json(&payload)
            .send()
            .await
            .map_err(request_failed)?;

        let http_status = response.status().as_u16();
        let body = response.text().await.map_err(request_failed)?;
        debug!(http_status, reference, "status response received");
        Ok(RawReply { http_status, body })
    }
}

/// Prefixes the key with the `Basic` scheme unless it already carries it.
fn basic_credentials(key: &str) -> String {
    if key.starts_with("Basic ") {
        key.to_string()
    } else {
        format!("Basic {key}")
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, HarambeeError> {
    HeaderValue::from_str(value)
        .map_err(|e| HarambeeError::Config(format!("invalid {field} header value: {e}")))
}

fn request_failed(e: reqwest::Error) -> HarambeeError {
    HarambeeError::Gateway {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> GatewayConfig {
        GatewayConfig {
            payments_url: format!("{base}/api/v2/payments"),
            status_base_url: base.to_string(),
            api_key: Some("dGVzdDp0ZXN0".into()),
            auth_token: Some("status-token".into()),
            ..GatewayConfig::default()
        }
    }

    fn payload() -> InitiatePayload<'static> {
        InitiatePayload {
            amount: 100,
            phone_number: "254712345678",
            channel_id: Some(42),
            provider: "m-pesa",
            external_reference: "DON-7-20260101120000-ab12",
            customer_name: Some("Jane Doe"),
            callback_url: None,
        }
    }

    #[test]
    fn basic_prefix_is_added_once() {
        assert_eq!(basic_credentials("abc"), "Basic abc");
        assert_eq!(basic_credentials("Basic abc"), "Basic abc");
    }

    #[tokio::test]
    async fn initiate_sends_basic_auth_and_decodes_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/payments"))
            .and(header("authorization", "Basic dGVzdDp0ZXN0"))
            .and(body_partial_json(serde_json::json!({
                "amount": 100,
                "phone_number": "254712345678",
                "provider": "m-pesa",
                "external_reference": "DON-7-20260101120000-ab12"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "reference": "GW-991",
                "CheckoutRequestID": "ws_CO_1",
                "status": "QUEUED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GatewayClient::new(&config(&server.uri())).unwrap();
        let reply = client.initiate(&payload()).await.unwrap();
        assert_eq!(reply.reference.as_deref(), Some("GW-991"));
        assert_eq!(reply.checkout_request_id.as_deref(), Some("ws_CO_1"));
    }

    #[tokio::test]
    async fn initiate_rejects_unsuccessful_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "message": "insufficient float"
            })))
            .mount(&server)
            .await;

        let client = GatewayClient::new(&config(&server.uri())).unwrap();
        let err = client.initiate(&payload()).await.unwrap_err();
        assert!(matches!(err, HarambeeError::Gateway { .. }));
        assert!(err.to_string().contains("insufficient float"), "got: {err}");
    }

    #[tokio::test]
    async fn initiate_without_api_key_is_a_config_error() {
        let mut cfg = config("http://127.0.0.1:9");
        cfg.api_key = None;
        let client = GatewayClient::new(&cfg).unwrap();
        assert!(matches!(
            client.initiate(&payload()).await,
            Err(HarambeeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn status_query_posts_reference_with_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/verify_payment"))
            .and(header("x-api-key", "status-token"))
            .and(body_partial_json(serde_json::json!({
                "CheckoutRequestID": "DON-1",
                "reference": "DON-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":false}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = GatewayClient::new(&config(&format!("{}/", server.uri()))).unwrap();
        let raw = client.query_status("DON-1").await.unwrap();
        assert_eq!(raw.http_status, 200);
        assert_eq!(raw.body, r#"{"status":false}"#);
    }
}
