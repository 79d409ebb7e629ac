//! x402 preflight service: a payment-gated agent endpoint plus route policy
//! compliance analysis over HTTP.
//!
//! # Modules
//!
//! - [`config`]: Environment configuration and the service's price table
//! - [`middleware`]: Payment gate middleware ([`payment_gate`](middleware::payment_gate))
//! - [`verifier`]: Facilitator HTTP client implementing the verifier capability
//! - [`routes`]: Health, metrics, preflight and JSON-RPC handlers
//! - [`metrics`]: Prometheus counters for requests, gate decisions and analyses

pub mod config;
pub mod cors;
pub mod error;
pub mod hmac;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;
pub mod verifier;

pub use config::{ConfigError, ServerConfig};
pub use error::ServerError;
pub use middleware::{payment_gate, MAX_BODY_BYTES};
pub use state::AppState;
pub use verifier::FacilitatorVerifier;
