// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the payment gateway's initiation and status endpoints.

use harambee_core::types::GatewayStatus;
use serde::{Deserialize, Serialize};

/// Body of a payment initiation request.
#[derive(Debug, Clone, Serialize)]
pub struct InitiatePayload<'a> {
    pub amount: i64,
    pub phone_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<i64>,
    pub provider: &'a str,
    pub external_reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<&'a str>,
}

/// Initiation reply. Only `success == true` replies carry the references.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of a status query. The internal reference is sent under both keys
/// the gateway looks up.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload<'a> {
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: &'a str,
    pub reference: &'a str,
    pub timestamp: String,
}

/// The `response` object of a status reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResult {
    #[serde(rename = "ResultCode", default)]
    pub result_code: Option<serde_json::Value>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
    #[serde(rename = "MpesaReceiptNumber", default)]
    pub receipt: Option<String>,
    #[serde(rename = "Phone", default)]
    pub phone: Option<serde_json::Value>,
}

/// A status reply as sent by the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusReply {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub response: Option<StatusResult>,
}

impl StatusReply {
    /// Classifies the reply, or returns `None` when it says nothing definite.
    ///
    /// `status: false` means the payer has not acted yet. Otherwise a
    /// `ResultCode` of zero is a completed payment and any other code a
    /// failed one.
    pub fn classify(&self) -> Option<GatewayStatus> {
        if matches!(self.status, Some(serde_json::Value::Bool(false))) {
            return Some(GatewayStatus::Pending);
        }
        let result = self.response.as_ref()?;
        let code = result.result_code.as_ref().and_then(result_code)?;
        if code == 0 {
            Some(GatewayStatus::Completed {
                receipt: result.receipt.clone(),
                phone: result.phone.as_ref().map(value_text),
            })
        } else {
            Some(GatewayStatus::Failed {
                reason: result
                    .result_desc
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| "Payment failed".to_string()),
            })
        }
    }
}

// Gateways disagree on whether codes are numbers or numeric strings.
fn result_code(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: serde_json::Value) -> StatusReply {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn status_false_is_pending() {
        let r = reply(serde_json::json!({"status": false, "message": "awaiting"}));
        assert_eq!(r.classify(), Some(GatewayStatus::Pending));
    }

    #[test]
    fn zero_result_code_is_completed() {
        let r = reply(serde_json::json!({
            "status": true,
            "response": {"ResultCode": 0, "MpesaReceiptNumber": "QFX12", "Phone": 254712345678u64}
        }));
        assert_eq!(
            r.classify(),
            Some(GatewayStatus::Completed {
                receipt: Some("QFX12".into()),
                phone: Some("254712345678".into()),
            })
        );
    }

    #[test]
    fn nonzero_result_code_is_failed_with_reason() {
        let r = reply(serde_json::json!({
            "response": {"ResultCode": "1032", "ResultDesc": "Request cancelled by user"}
        }));
        assert_eq!(
            r.classify(),
            Some(GatewayStatus::Failed {
                reason: "Request cancelled by user".into()
            })
        );

        let r = reply(serde_json::json!({"response": {"ResultCode": 1}}));
        assert_eq!(
            r.classify(),
            Some(GatewayStatus::Failed {
                reason: "Payment failed".into()
            })
        );
    }

    #[test]
    fn replies_without_a_code_are_unclassified() {
        assert_eq!(reply(serde_json::json!({})).classify(), None);
        assert_eq!(
            reply(serde_json::json!({"status": true, "response": {}})).classify(),
            None
        );
        assert_eq!(
            reply(serde_json::json!({"response": {"ResultCode": null}})).classify(),
            None
        );
    }
}
