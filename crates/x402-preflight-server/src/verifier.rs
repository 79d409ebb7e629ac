//! HTTP facilitator client implementing [`PaymentVerifier`].

use async_trait::async_trait;
use base64::Engine;
use preflight::constants::X402_VERSION;
use preflight::{PaymentVerifier, VerificationOutcome, VerificationRequest, VerifierError};
use serde::Deserialize;
use std::time::Duration;

use crate::hmac::{sign_body, FACILITATOR_AUTH_HEADER};

const FACILITATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// The facilitator's `/verify` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default)]
    pub invalid_reason: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
}

impl From<VerifyResponse> for VerificationOutcome {
    fn from(resp: VerifyResponse) -> Self {
        if resp.is_valid {
            VerificationOutcome::Valid { payer: resp.payer }
        } else {
            VerificationOutcome::Invalid {
                reason: resp
                    .invalid_reason
                    .unwrap_or_else(|| "payment rejected".to_string()),
            }
        }
    }
}

/// Decode the base64 JSON proof header.
pub fn decode_payment_header(header_value: &str) -> Result<serde_json::Value, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(header_value.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON payload: {e}"))
}

/// Verifies proofs by calling `{facilitator_url}/verify`.
///
/// The facilitator URL comes from each [`VerificationRequest`], so one client
/// serves every route. Timeouts live here, not in the gate.
#[derive(Clone)]
pub struct FacilitatorVerifier {
    client: reqwest::Client,
    hmac_secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for FacilitatorVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorVerifier")
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl FacilitatorVerifier {
    pub fn new(hmac_secret: Option<Vec<u8>>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(FACILITATOR_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none()) // Prevent SSRF via redirects
            .build()?;
        Ok(Self::with_client(client, hmac_secret))
    }

    pub fn with_client(client: reqwest::Client, hmac_secret: Option<Vec<u8>>) -> Self {
        Self {
            client,
            hmac_secret,
        }
    }
}

#[async_trait]
impl PaymentVerifier for FacilitatorVerifier {
    async fn verify(
        &self,
        request: VerificationRequest<'_>,
    ) -> Result<VerificationOutcome, VerifierError> {
        let payload = match decode_payment_header(request.proof) {
            Ok(p) => p,
            Err(reason) => {
                tracing::warn!(error = %reason, "undecodable payment header");
                return Ok(VerificationOutcome::Invalid { reason });
            }
        };

        let url = format!("{}/verify", request.facilitator_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "x402Version": X402_VERSION,
            "paymentPayload": payload,
            "paymentRequirements": request.requirements,
        });
        let body_bytes = serde_json::to_vec(&body)
            .map_err(|e| VerifierError::Unavailable(format!("serialization failed: {e}")))?;

        let mut http_request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.hmac_secret {
            http_request = http_request.header(FACILITATOR_AUTH_HEADER, sign_body(secret, &body_bytes));
        }

        let resp = http_request
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| VerifierError::Unavailable(format!("facilitator request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VerifierError::Unavailable(
                "facilitator authentication failed".to_string(),
            ));
        }
        if status.is_server_error() || status.is_redirection() {
            return Err(VerifierError::Unavailable(format!(
                "facilitator returned {status}"
            )));
        }

        let verdict: VerifyResponse = resp.json().await.map_err(|e| {
            VerifierError::Unavailable(format!("facilitator response parse failed: {e}"))
        })?;
        Ok(verdict.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use preflight::PaymentRequirements;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "eip155:84532".to_string(),
            price: "$0.01".to_string(),
            max_amount_required: "10000".to_string(),
            resource: "/a2a".to_string(),
            pay_to: Address::ZERO,
            max_timeout_seconds: 60,
            description: None,
            mime_type: None,
        }
    }

    #[test]
    fn test_decode_valid_header() {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(br#"{"x402Version":1,"payload":{"signature":"0xdead"}}"#);
        let decoded = decode_payment_header(&encoded).unwrap();
        assert_eq!(decoded["x402Version"], 1);
        assert_eq!(decoded["payload"]["signature"], "0xdead");
    }

    #[test]
    fn test_decode_invalid_base64() {
        let result = decode_payment_header("not-valid-base64!!!");
        assert!(result.unwrap_err().contains("invalid base64"));
    }

    #[test]
    fn test_decode_invalid_json() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"this is not json");
        assert!(decode_payment_header(&encoded)
            .unwrap_err()
            .contains("invalid JSON"));
    }

    #[test]
    fn test_verify_response_mapping() {
        let valid: VerifyResponse =
            serde_json::from_str(r#"{"isValid":true,"payer":"0xabc"}"#).unwrap();
        assert_eq!(
            VerificationOutcome::from(valid),
            VerificationOutcome::Valid {
                payer: Some("0xabc".to_string())
            }
        );

        let invalid: VerifyResponse =
            serde_json::from_str(r#"{"isValid":false,"invalidReason":"expired"}"#).unwrap();
        assert_eq!(
            VerificationOutcome::from(invalid),
            VerificationOutcome::Invalid {
                reason: "expired".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_undecodable_proof_is_invalid_not_unavailable() {
        let verifier = FacilitatorVerifier::new(None).unwrap();
        let reqs = requirements();
        let outcome = verifier
            .verify(VerificationRequest {
                proof: "%%%",
                requirements: &reqs,
                facilitator_url: "http://localhost:1",
            })
            .await;
        assert!(matches!(outcome, Ok(VerificationOutcome::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_facilitator_is_unavailable() {
        let verifier = FacilitatorVerifier::new(Some(vec![7u8; 32])).unwrap();
        let reqs = requirements();
        let proof = base64::engine::general_purpose::STANDARD.encode(b"{}");
        let outcome = verifier
            .verify(VerificationRequest {
                proof: &proof,
                requirements: &reqs,
                facilitator_url: "http://localhost:1",
            })
            .await;
        assert!(matches!(outcome, Err(VerifierError::Unavailable(_))));
    }
}
