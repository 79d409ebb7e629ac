use preflight::{ComplianceAnalyzer, PaymentGate, PaymentVerifier};
use std::sync::Arc;

use crate::config::{ConfigError, ServerConfig};
use crate::verifier::FacilitatorVerifier;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<PaymentGate>,
    pub verifier: Arc<dyn PaymentVerifier>,
    pub analyzer: Arc<ComplianceAnalyzer>,
    /// Bearer token required for /metrics (None = public)
    pub metrics_token: Option<String>,
}

impl AppState {
    pub fn new(
        gate: PaymentGate,
        verifier: Arc<dyn PaymentVerifier>,
        analyzer: ComplianceAnalyzer,
        metrics_token: Option<String>,
    ) -> Self {
        Self {
            gate: Arc::new(gate),
            verifier,
            analyzer: Arc::new(analyzer),
            metrics_token,
        }
    }

    /// Wire the gate, the facilitator client and the analyzer from configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let gate = config.payment_gate()?;
        let verifier = FacilitatorVerifier::new(config.hmac_secret.clone())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let analyzer = ComplianceAnalyzer::new(config.analyzer_defaults.clone());

        Ok(Self::new(
            gate,
            Arc::new(verifier),
            analyzer,
            config.metrics_token.clone(),
        ))
    }
}
