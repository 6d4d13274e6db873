// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mobile-money payment gateway trait.

use async_trait::async_trait;

use crate::error::HarambeeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GatewayReply, InitiateRequest, InitiateResponse};

/// Adapter for the external service that pushes payment prompts to payers
/// and reports their outcome.
#[async_trait]
pub trait PaymentGateway: PluginAdapter {
    /// Submits a payment request. Called at most once per payment.
    async fn initiate(&self, request: &InitiateRequest)
    -> Result<InitiateResponse, HarambeeError>;

    /// Queries the outcome of the payment with the given internal reference.
    ///
    /// Safe to retry. Transport failures, non-200 answers and bodies that
    /// cannot be classified are returned as [`HarambeeError::Gateway`]; the
    /// verification loop treats those as inconclusive polls.
    async fn get_status(&self, reference: &str) -> Result<GatewayReply, HarambeeError>;
}
