// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock payment gateway for deterministic testing.
//!
//! `MockGateway` answers status queries from a FIFO script. When the script
//! is empty it repeats a fallback reply, `Pending` unless changed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use harambee_core::HarambeeError;
use harambee_core::traits::adapter::PluginAdapter;
use harambee_core::traits::gateway::PaymentGateway;
use harambee_core::types::{
    AdapterType, GatewayReply, GatewayStatus, HealthStatus, InitiateRequest, InitiateResponse,
};

type ScriptedReply = Result<GatewayStatus, String>;

/// A mock gateway with scripted status replies.
pub struct MockGateway {
    script: Arc<Mutex<VecDeque<ScriptedReply>>>,
    fallback: Arc<Mutex<ScriptedReply>>,
    delay: Arc<Mutex<Option<Duration>>>,
    initiation_delay: Arc<Mutex<Option<Duration>>>,
    initiated: Arc<Mutex<Vec<InitiateRequest>>>,
    status_calls: AtomicUsize,
    fail_initiation: AtomicBool,
    shut_down: AtomicBool,
}

impl MockGateway {
    /// A gateway that reports every payment as pending.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(Ok(GatewayStatus::Pending))),
            delay: Arc::new(Mutex::new(None)),
            initiation_delay: Arc::new(Mutex::new(None)),
            initiated: Arc::new(Mutex::new(Vec::new())),
            status_calls: AtomicUsize::new(0),
            fail_initiation: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Queue a status for the next unanswered query.
    pub async fn push_status(&self, status: GatewayStatus) {
        self.script.lock().await.push_back(Ok(status));
    }

    /// Queue an inconclusive (errored) query.
    pub async fn push_error(&self, message: &str) {
        self.script.lock().await.push_back(Err(message.to_string()));
    }

    /// Reply used once the script is exhausted.
    pub async fn set_fallback(&self, status: GatewayStatus) {
        *self.fallback.lock().await = Ok(status);
    }

    /// Make every status query take `delay` before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// Make every initiation take `delay` after the request is recorded.
    pub async fn set_initiation_delay(&self, delay: Duration) {
        *self.initiation_delay.lock().await = Some(delay);
    }

    pub fn fail_initiation(&self, fail: bool) {
        self.fail_initiation.store(fail, Ordering::SeqCst);
    }

    /// Number of status queries received, including ones abandoned mid-flight.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Initiation requests received, in order.
    pub async fn initiated(&self) -> Vec<InitiateRequest> {
        self.initiated.lock().await.clone()
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    async fn next_reply(&self) -> ScriptedReply {
        let scripted = self.script.lock().await.pop_front();
        match scripted {
            Some(reply) => reply,
            None => self.fallback.lock().await.clone(),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockGateway {
    fn name(&self) -> &str {
        "mock-gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, HarambeeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HarambeeError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initiate(
        &self,
        request: &InitiateRequest,
    ) -> Result<InitiateResponse, HarambeeError> {
        let count = {
            let mut initiated = self.initiated.lock().await;
            initiated.push(request.clone());
            initiated.len()
        };
        let delay = *self.initiation_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_initiation.load(Ordering::SeqCst) {
            return Err(HarambeeError::gateway("mock initiation failure"));
        }
        Ok(InitiateResponse {
            gateway_reference: format!("GW-{count}"),
            checkout_id: format!("ws_CO_{count}"),
            status: Some("QUEUED".into()),
        })
    }

    async fn get_status(&self, reference: &str) -> Result<GatewayReply, HarambeeError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_reply().await {
            Ok(status) => Ok(GatewayReply {
                raw: format!("{{\"reference\":\"{reference}\",\"status\":\"{status:?}\"}}"),
                status,
                http_status: 200,
            }),
            Err(message) => Err(HarambeeError::gateway(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_then_fallback() {
        let gw = MockGateway::new();
        gw.push_error("boom").await;
        gw.push_status(GatewayStatus::Failed {
            reason: "declined".into(),
        })
        .await;

        assert!(gw.get_status("R").await.is_err());
        assert_eq!(
            gw.get_status("R").await.unwrap().status,
            GatewayStatus::Failed {
                reason: "declined".into()
            }
        );
        assert_eq!(gw.get_status("R").await.unwrap().status, GatewayStatus::Pending);
        assert_eq!(gw.status_calls(), 3);
    }

    #[tokio::test]
    async fn initiation_is_recorded_even_when_failing() {
        let gw = MockGateway::new();
        gw.fail_initiation(true);
        let request = InitiateRequest {
            amount: 10,
            phone: "254712345678".into(),
            external_reference: "R".into(),
            customer_name: None,
        };
        assert!(gw.initiate(&request).await.is_err());
        assert_eq!(gw.initiated().await, vec![request]);
    }
}
