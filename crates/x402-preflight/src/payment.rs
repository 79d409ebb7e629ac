use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::constants::X402_VERSION;

/// A single entry in the `accepts` array of a 402 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    pub price: String,
    /// Price in atomic token units.
    pub max_amount_required: String,
    pub resource: String,
    pub pay_to: Address,
    pub max_timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The 402 response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub x402_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequiredBody {
    pub fn new(requirements: &PaymentRequirements, error: impl Into<String>) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: Some(error.into()),
            accepts: vec![requirements.clone()],
        }
    }
}

/// Receipt echoed to the caller after a proof verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    pub network: String,
}
