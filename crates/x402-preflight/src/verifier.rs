//! The payment verification capability the gate delegates to.
//!
//! Implementations own transport, timeouts and retries; the gate awaits the
//! call once and maps the result.

use async_trait::async_trait;

use crate::error::VerifierError;
use crate::payment::PaymentRequirements;

/// Everything a verifier needs to judge one proof.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    /// Raw proof header value, as received.
    pub proof: &'a str,
    /// Price, network and receivable address the proof must satisfy.
    pub requirements: &'a PaymentRequirements,
    pub facilitator_url: &'a str,
}

/// A verdict on a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid { payer: Option<String> },
    Invalid { reason: String },
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(
        &self,
        request: VerificationRequest<'_>,
    ) -> Result<VerificationOutcome, VerifierError>;
}
