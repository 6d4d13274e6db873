// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mobile-money payment gateway adapter for the Harambee donation bot.
//!
//! This crate implements [`PaymentGateway`] over the gateway's JSON HTTP
//! API: one endpoint to push a payment prompt to the payer's phone and one
//! to ask whether a given reference has settled.

pub mod client;
pub mod types;

use async_trait::async_trait;
use harambee_config::model::GatewayConfig;
use harambee_core::error::HarambeeError;
use harambee_core::traits::{PaymentGateway, PluginAdapter};
use harambee_core::types::{
    AdapterType, GatewayReply, HealthStatus, InitiateRequest, InitiateResponse,
};
use tracing::{debug, info, warn};

use crate::client::GatewayClient;
use crate::types::{InitiatePayload, StatusReply};

/// Payment gateway implementing [`PaymentGateway`] over HTTP.
pub struct HttpGateway {
    client: GatewayClient,
    channel_id: Option<i64>,
    provider: String,
    callback_url: Option<String>,
}

impl HttpGateway {
    /// Creates a gateway adapter from the `[gateway]` configuration section.
    pub fn new(config: &GatewayConfig) -> Result<Self, HarambeeError> {
        let client = GatewayClient::new(config)?;
        info!(
            payments_url = config.payments_url,
            status_base_url = config.status_base_url,
            "payment gateway initialized"
        );
        Ok(Self {
            client,
            channel_id: config.channel_id,
            provider: config.provider.clone(),
            callback_url: config.callback_url.clone(),
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpGateway {
    fn name(&self) -> &str {
        "http-gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, HarambeeError> {
        // The gateway has no side-effect-free ping endpoint.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HarambeeError> {
        debug!("payment gateway shutting down");
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn initiate(
        &self,
        request: &InitiateRequest,
    ) -> Result<InitiateResponse, HarambeeError> {
        let payload = InitiatePayload {
            amount: request.amount,
            phone_number: &request.phone,
            channel_id: self.channel_id,
            provider: &self.provider,
            external_reference: &request.external_reference,
            customer_name: request.customer_name.as_deref(),
            callback_url: self.callback_url.as_deref(),
        };
        let reply = self.client.initiate(&payload).await?;

        match (reply.reference, reply.checkout_request_id) {
            (Some(gateway_reference), Some(checkout_id)) => {
                info!(
                    reference = request.external_reference,
                    gateway_reference,
                    "payment request accepted by gateway"
                );
                Ok(InitiateResponse {
                    gateway_reference,
                    checkout_id,
                    status: reply.status,
                })
            }
            _ => Err(HarambeeError::gateway(
                "initiation reply is missing reference or CheckoutRequestID",
            )),
        }
    }

    async fn get_status(&self, reference: &str) -> Result<GatewayReply, HarambeeError> {
        let raw = self.client.query_status(reference).await?;
        if raw.http_status != 200 {
            warn!(reference, http_status = raw.http_status, "status query rejected");
            return Err(HarambeeError::gateway(format!(
                "status query returned HTTP {}",
                raw.http_status
            )));
        }

        let reply: StatusReply =
            serde_json::from_str(&raw.body).map_err(|e| HarambeeError::Gateway {
                message: format!("malformed status reply: {e}"),
                source: Some(Box::new(e)),
            })?;
        let status = reply.classify().ok_or_else(|| {
            HarambeeError::gateway(format!("status reply could not be classified: {}", raw.body))
        })?;

        Ok(GatewayReply {
            status,
            http_status: raw.http_status,
            raw: raw.body,
        })
    }
}
