//! Per-request payment enforcement decisions.
//!
//! Plain routes are enforced when `"{METHOD} {path}"` is priced. The JSON-RPC
//! endpoint shares one priced path across many operations, so there the
//! envelope's `method` field decides instead.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::constants::SCHEME_NAME;
use crate::error::{GateError, VerifierError};
use crate::payment::{PaymentReceipt, PaymentRequiredBody, PaymentRequirements};
use crate::price::parse_price;
use crate::verifier::{PaymentVerifier, VerificationOutcome, VerificationRequest};

const MAX_TIMEOUT_SECONDS: u64 = 60;

/// What to do when the JSON-RPC body cannot be read as an envelope with a
/// string `method`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedRpcPolicy {
    /// Let the request through unpaid (fail open). The handler still rejects
    /// the body as a JSON-RPC parse error.
    #[default]
    Bypass,
    /// Demand payment as if the method were chargeable (fail closed).
    Enforce,
}

impl FromStr for MalformedRpcPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bypass" => Ok(Self::Bypass),
            "enforce" => Ok(Self::Enforce),
            other => Err(format!("unknown malformed RPC policy '{other}'")),
        }
    }
}

/// A priced route and the requirements advertised for it.
#[derive(Debug, Clone)]
pub struct PricedRoute {
    pub method: String,
    pub path: String,
    pub requirements: PaymentRequirements,
}

#[derive(Debug, Clone)]
struct RpcEndpoint {
    path: String,
    chargeable_methods: HashSet<String>,
}

/// Why a request was let through without payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassReason {
    NotPriced,
    MethodNotChargeable(String),
    MalformedRpcBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision<'a> {
    Enforce(&'a PaymentRequirements),
    Bypass(BypassReason),
}

/// The parts of an inbound request the gate looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct InboundRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub body: Option<&'a [u8]>,
    pub proof: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Not enforced; hand the request to its handler.
    Proceed(BypassReason),
    /// Enforced and the proof verified.
    Verified(PaymentReceipt),
    /// Enforced and the proof was missing or rejected.
    PaymentRequired(PaymentRequiredBody),
    /// Enforced but the verifier could not reach a verdict.
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    method: Option<String>,
}

/// Read the `method` of a JSON-RPC envelope without taking ownership of the body.
pub fn rpc_method(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<RpcEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.method)
}

pub struct PaymentGate {
    routes: HashMap<String, PricedRoute>,
    rpc: Option<RpcEndpoint>,
    malformed_rpc: MalformedRpcPolicy,
    network: String,
    facilitator_url: String,
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.routes.keys().collect();
        keys.sort();
        f.debug_struct("PaymentGate")
            .field("routes", &keys)
            .field("rpc_path", &self.rpc.as_ref().map(|r| &r.path))
            .field("malformed_rpc", &self.malformed_rpc)
            .field("network", &self.network)
            .field("facilitator_url", &self.facilitator_url)
            .finish()
    }
}

fn route_key(method: &str, path: &str) -> String {
    format!("{} {path}", method.to_ascii_uppercase())
}

impl PaymentGate {
    pub fn builder(
        pay_to: Address,
        network: impl Into<String>,
        facilitator_url: impl Into<String>,
    ) -> PaymentGateBuilder {
        PaymentGateBuilder::new(pay_to, network, facilitator_url)
    }

    /// Look up the priced route for a method and path.
    pub fn get_route(&self, method: &str, path: &str) -> Option<&PricedRoute> {
        self.routes.get(&route_key(method, path))
    }

    pub fn routes(&self) -> impl Iterator<Item = &PricedRoute> {
        self.routes.values()
    }

    pub fn facilitator_url(&self) -> &str {
        &self.facilitator_url
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn malformed_rpc_policy(&self) -> MalformedRpcPolicy {
        self.malformed_rpc
    }

    /// Whether [`decide`](Self::decide) needs the request body for this request.
    pub fn needs_body(&self, method: &str, path: &str) -> bool {
        self.is_rpc_path(path) && self.get_route(method, path).is_some()
    }

    fn is_rpc_path(&self, path: &str) -> bool {
        self.rpc.as_ref().is_some_and(|rpc| rpc.path == path)
    }

    /// Decide whether this request must pay. Pure apart from logging.
    pub fn decide(&self, method: &str, path: &str, body: Option<&[u8]>) -> GateDecision<'_> {
        let Some(route) = self.get_route(method, path) else {
            return GateDecision::Bypass(BypassReason::NotPriced);
        };

        let Some(rpc) = self.rpc.as_ref().filter(|rpc| rpc.path == path) else {
            return GateDecision::Enforce(&route.requirements);
        };

        match body.and_then(rpc_method) {
            Some(name) if rpc.chargeable_methods.contains(&name) => {
                tracing::debug!(rpc_method = %name, path, "chargeable RPC method");
                GateDecision::Enforce(&route.requirements)
            }
            Some(name) => {
                tracing::debug!(rpc_method = %name, path, "RPC method not chargeable");
                GateDecision::Bypass(BypassReason::MethodNotChargeable(name))
            }
            None => match self.malformed_rpc {
                MalformedRpcPolicy::Bypass => {
                    tracing::warn!(path, "unreadable JSON-RPC method, bypassing payment (fail open)");
                    GateDecision::Bypass(BypassReason::MalformedRpcBody)
                }
                MalformedRpcPolicy::Enforce => {
                    tracing::warn!(path, "unreadable JSON-RPC method, enforcing payment (fail closed)");
                    GateDecision::Enforce(&route.requirements)
                }
            },
        }
    }

    /// Decide, and when enforcing, delegate the proof to `verifier` exactly once.
    pub async fn evaluate(
        &self,
        request: &InboundRequest<'_>,
        verifier: &dyn PaymentVerifier,
    ) -> GateOutcome {
        let requirements = match self.decide(request.method, request.path, request.body) {
            GateDecision::Bypass(reason) => return GateOutcome::Proceed(reason),
            GateDecision::Enforce(requirements) => requirements,
        };

        let Some(proof) = request.proof.filter(|p| !p.trim().is_empty()) else {
            tracing::debug!(path = request.path, "payment proof missing");
            return GateOutcome::PaymentRequired(PaymentRequiredBody::new(
                requirements,
                "X-PAYMENT header is required",
            ));
        };

        let verification = verifier
            .verify(VerificationRequest {
                proof,
                requirements,
                facilitator_url: &self.facilitator_url,
            })
            .await;

        match verification {
            Ok(VerificationOutcome::Valid { payer }) => {
                tracing::info!(path = request.path, payer = ?payer, "payment verified");
                GateOutcome::Verified(PaymentReceipt {
                    success: true,
                    payer,
                    network: requirements.network.clone(),
                })
            }
            Ok(VerificationOutcome::Invalid { reason }) => {
                tracing::warn!(path = request.path, reason = %reason, "payment rejected");
                GateOutcome::PaymentRequired(PaymentRequiredBody::new(requirements, reason))
            }
            Err(VerifierError::Unavailable(e)) => {
                tracing::error!(path = request.path, error = %e, "payment verifier unavailable");
                GateOutcome::Unavailable(e)
            }
        }
    }
}

struct RouteSpec {
    method: String,
    path: String,
    price: String,
    description: Option<String>,
}

/// Builder for a [`PaymentGate`] with priced routes and an optional JSON-RPC endpoint.
pub struct PaymentGateBuilder {
    pay_to: Address,
    network: String,
    facilitator_url: String,
    routes: Vec<RouteSpec>,
    rpc: Option<RpcEndpoint>,
    malformed_rpc: MalformedRpcPolicy,
}

impl PaymentGateBuilder {
    pub fn new(
        pay_to: Address,
        network: impl Into<String>,
        facilitator_url: impl Into<String>,
    ) -> Self {
        Self {
            pay_to,
            network: network.into(),
            facilitator_url: facilitator_url.into(),
            routes: Vec::new(),
            rpc: None,
            malformed_rpc: MalformedRpcPolicy::default(),
        }
    }

    /// Register a priced route (e.g. `route("POST", "/api/report", "$0.03", Some("..."))`).
    pub fn route(mut self, method: &str, path: &str, price: &str, description: Option<&str>) -> Self {
        self.routes.push(RouteSpec {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            price: price.to_string(),
            description: description.map(String::from),
        });
        self
    }

    /// Register the JSON-RPC endpoint: `POST {path}` is priced, but only the
    /// listed RPC methods are charged.
    pub fn rpc_endpoint<I, S>(
        self,
        path: &str,
        price: &str,
        description: Option<&str>,
        chargeable_methods: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = self.route("POST", path, price, description);
        builder.rpc = Some(RpcEndpoint {
            path: path.to_string(),
            chargeable_methods: chargeable_methods.into_iter().map(Into::into).collect(),
        });
        builder
    }

    pub fn malformed_rpc_policy(mut self, policy: MalformedRpcPolicy) -> Self {
        self.malformed_rpc = policy;
        self
    }

    pub fn build(self) -> Result<PaymentGate, GateError> {
        let mut routes = HashMap::with_capacity(self.routes.len());

        for entry in self.routes {
            if !entry.path.starts_with('/') {
                return Err(GateError::InvalidRoute(format!(
                    "path must start with '/': {}",
                    entry.path
                )));
            }
            if entry.method.is_empty() {
                return Err(GateError::InvalidRoute(format!(
                    "method missing for {}",
                    entry.path
                )));
            }

            let amount = parse_price(&entry.price)?;
            if amount == 0 {
                return Err(GateError::InvalidPrice(format!(
                    "'{}': priced routes must cost more than zero",
                    entry.price
                )));
            }

            let key = route_key(&entry.method, &entry.path);
            let requirements = PaymentRequirements {
                scheme: SCHEME_NAME.to_string(),
                network: self.network.clone(),
                price: entry.price,
                max_amount_required: amount.to_string(),
                resource: entry.path.clone(),
                pay_to: self.pay_to,
                max_timeout_seconds: MAX_TIMEOUT_SECONDS,
                description: entry.description,
                mime_type: Some("application/json".to_string()),
            };
            let route = PricedRoute {
                method: entry.method,
                path: entry.path,
                requirements,
            };
            if routes.insert(key.clone(), route).is_some() {
                return Err(GateError::DuplicateRoute(key));
            }
        }

        Ok(PaymentGate {
            routes,
            rpc: self.rpc,
            malformed_rpc: self.malformed_rpc,
            network: self.network,
            facilitator_url: self.facilitator_url,
        })
    }
}
