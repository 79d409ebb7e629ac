use thiserror::Error;

/// Errors raised while building a [`PaymentGate`](crate::gate::PaymentGate).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("duplicate route: {0}")]
    DuplicateRoute(String),
}

/// Failures of the verifier capability that are not a verdict on the proof.
///
/// A rejected proof is a [`VerificationOutcome::Invalid`](crate::verifier::VerificationOutcome),
/// not an error: this type means the verifier could not reach a verdict at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}
