//! Structural validation of analysis request bodies.
//!
//! Validation answers "can this be analyzed at all"; it never produces
//! findings. Every error in a body is collected before returning.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::constants::DEFAULT_APP_NAME;
use crate::policy::{AnalysisInput, RoutePolicy};

/// Flattened validation breakdown: body-level messages plus per-field messages
/// keyed by dotted path (`routes.1.priceUsd`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("invalid analysis input: {} form error(s), {} field error(s)", .form_errors.len(), .field_errors.len())]
pub struct ValidationError {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    fn form(message: impl Into<String>) -> Self {
        Self {
            form_errors: vec![message.into()],
            field_errors: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.form_errors.is_empty() && self.field_errors.is_empty()
    }

    /// Messages recorded for one dotted field path.
    pub fn field(&self, path: &str) -> Option<&[String]> {
        self.field_errors.get(path).map(Vec::as_slice)
    }
}

/// Parse and validate a bare `AnalysisInput` body.
pub fn parse_input(body: &[u8]) -> Result<AnalysisInput, ValidationError> {
    let value = parse_json(body)?;
    validate_input(&value)
}

/// Parse and validate an `{ "input": AnalysisInput }` invocation envelope.
pub fn parse_envelope(body: &[u8]) -> Result<AnalysisInput, ValidationError> {
    let value = parse_json(body)?;
    validate_envelope(&value)
}

fn parse_json(body: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(body)
        .map_err(|e| ValidationError::form(format!("body is not valid JSON: {e}")))
}

pub fn validate_input(value: &Value) -> Result<AnalysisInput, ValidationError> {
    let mut collector = Collector::new("");
    let input = collector.input(value);
    collector.finish(input)
}

pub fn validate_envelope(value: &Value) -> Result<AnalysisInput, ValidationError> {
    let Some(envelope) = value.as_object() else {
        return Err(ValidationError::form("expected a JSON object"));
    };
    let mut collector = Collector::new("");
    let input = match envelope.get("input") {
        Some(inner) => {
            collector.prefix = "input.".to_string();
            collector.input(inner)
        }
        None => {
            collector.field("input", "required");
            None
        }
    };
    collector.finish(input)
}

struct Collector {
    prefix: String,
    errors: ValidationError,
}

impl Collector {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            errors: ValidationError::default(),
        }
    }

    fn field(&mut self, path: &str, message: impl Into<String>) {
        let key = format!("{}{}", self.prefix, path);
        self.errors
            .field_errors
            .entry(key)
            .or_default()
            .push(message.into());
    }

    fn finish(self, input: Option<AnalysisInput>) -> Result<AnalysisInput, ValidationError> {
        match input {
            Some(input) if self.errors.is_empty() => Ok(input),
            _ => Err(self.errors),
        }
    }

    fn input(&mut self, value: &Value) -> Option<AnalysisInput> {
        let Some(obj) = value.as_object() else {
            if self.prefix.is_empty() {
                self.errors.form_errors.push("expected a JSON object".to_string());
            } else {
                let key = self.prefix.trim_end_matches('.').to_string();
                self.errors
                    .field_errors
                    .entry(key)
                    .or_default()
                    .push("expected object".to_string());
            }
            return None;
        };

        let app_name = self
            .string(obj, "appName", "appName")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        let network = self.string(obj, "network", "network");
        let facilitator_url = self.url(obj, "facilitatorUrl", "facilitatorUrl");
        let receivable_address = self.string(obj, "receivableAddress", "receivableAddress");

        let routes = match obj.get("routes") {
            None | Some(Value::Null) => {
                self.field("routes", "required");
                Vec::new()
            }
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    self.field("routes", "must contain at least 1 route");
                }
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, item)| self.route(idx, item))
                    .collect()
            }
            Some(_) => {
                self.field("routes", "expected array");
                Vec::new()
            }
        };

        Some(AnalysisInput {
            app_name,
            network,
            facilitator_url,
            receivable_address,
            routes,
        })
    }

    fn route(&mut self, idx: usize, value: &Value) -> Option<RoutePolicy> {
        let base = format!("routes.{idx}");
        let Some(obj) = value.as_object() else {
            self.field(&base, "expected object");
            return None;
        };

        let path = match obj.get("path") {
            Some(Value::String(p)) if !p.is_empty() => Some(p.clone()),
            Some(Value::String(_)) => {
                self.field(&format!("{base}.path"), "must not be empty");
                None
            }
            None | Some(Value::Null) => {
                self.field(&format!("{base}.path"), "required");
                None
            }
            Some(_) => {
                self.field(&format!("{base}.path"), "expected string");
                None
            }
        };

        let method = self
            .string(obj, "method", &format!("{base}.method"))
            .filter(|m| !m.is_empty());

        let requires_payment = match obj.get("requiresPayment").or_else(|| obj.get("requiresX402")) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                self.field(&format!("{base}.requiresPayment"), "expected boolean");
                false
            }
        };

        let price_usd = match obj.get("priceUsd") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(p) if p.is_finite() && p >= 0.0 => Some(p),
                _ => {
                    self.field(
                        &format!("{base}.priceUsd"),
                        "must be a number greater than or equal to 0",
                    );
                    None
                }
            },
            Some(_) => {
                self.field(&format!("{base}.priceUsd"), "expected number");
                None
            }
        };

        let network = self.string(obj, "network", &format!("{base}.network"));
        let facilitator_url = self.url(obj, "facilitatorUrl", &format!("{base}.facilitatorUrl"));
        let receivable_address =
            self.string(obj, "receivableAddress", &format!("{base}.receivableAddress"));

        let mut route = RoutePolicy::new(path?);
        if let Some(method) = method {
            route.method = method;
        }
        route.requires_payment = requires_payment;
        route.price_usd = price_usd;
        route.network = network;
        route.facilitator_url = facilitator_url;
        route.receivable_address = receivable_address;
        Some(route)
    }

    fn string(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.field(path, "expected string");
                None
            }
        }
    }

    fn url(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        let raw = self.string(obj, key, path)?;
        match Url::parse(&raw) {
            Ok(_) => Some(raw),
            Err(_) => {
                self.field(path, "invalid url");
                None
            }
        }
    }
}
