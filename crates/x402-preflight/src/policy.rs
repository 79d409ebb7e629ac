//! Route payment policy model shared by the analyzer and the gate.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_APP_NAME;

/// One HTTP operation's declared payment requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePolicy {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, alias = "requiresX402")]
    pub requires_payment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receivable_address: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

impl RoutePolicy {
    /// A route with the default method and no payment settings.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: default_method(),
            requires_payment: false,
            price_usd: None,
            network: None,
            facilitator_url: None,
            receivable_address: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn paid(mut self, price_usd: f64) -> Self {
        self.requires_payment = true;
        self.price_usd = Some(price_usd);
        self
    }

    pub fn price(mut self, price_usd: f64) -> Self {
        self.price_usd = Some(price_usd);
        self
    }

    pub fn requires_payment(mut self, requires: bool) -> Self {
        self.requires_payment = requires;
        self
    }

    pub fn facilitator(mut self, url: impl Into<String>) -> Self {
        self.facilitator_url = Some(url.into());
        self
    }

    pub fn receivable(mut self, address: impl Into<String>) -> Self {
        self.receivable_address = Some(address.into());
        self
    }

    /// Upper-cased HTTP method as rendered in findings.
    pub fn method_upper(&self) -> String {
        self.method.to_uppercase()
    }

    /// Declared price, if strictly positive.
    pub fn positive_price(&self) -> Option<f64> {
        self.price_usd.filter(|p| *p > 0.0)
    }
}

/// One analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receivable_address: Option<String>,
    pub routes: Vec<RoutePolicy>,
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

impl AnalysisInput {
    pub fn new(app_name: impl Into<String>, routes: Vec<RoutePolicy>) -> Self {
        let app_name = app_name.into();
        Self {
            app_name: if app_name.is_empty() {
                default_app_name()
            } else {
                app_name
            },
            network: None,
            facilitator_url: None,
            receivable_address: None,
            routes,
        }
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn facilitator(mut self, url: impl Into<String>) -> Self {
        self.facilitator_url = Some(url.into());
        self
    }

    pub fn receivable(mut self, address: impl Into<String>) -> Self {
        self.receivable_address = Some(address.into());
        self
    }

    pub fn paid_route_count(&self) -> usize {
        self.routes.iter().filter(|r| r.requires_payment).count()
    }
}

/// Process-level tier of the global settings resolution chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessDefaults {
    pub network: Option<String>,
    pub facilitator_url: Option<String>,
    pub receivable_address: Option<String>,
}

impl ProcessDefaults {
    /// Read `NETWORK`, `FACILITATOR_URL` and `PAYMENTS_RECEIVABLE_ADDRESS`
    /// from `lookup` as-is.
    ///
    /// No built-in fallbacks: an unset variable stays absent so the analyzer
    /// can report it.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            network: read("NETWORK"),
            facilitator_url: read("FACILITATOR_URL"),
            receivable_address: read("PAYMENTS_RECEIVABLE_ADDRESS"),
        }
    }
}

/// Global settings after resolution against [`ProcessDefaults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGlobals<'a> {
    pub network: Option<&'a str>,
    pub facilitator_url: Option<&'a str>,
    pub receivable_address: Option<&'a str>,
}

impl<'a> ResolvedGlobals<'a> {
    pub fn resolve(input: &'a AnalysisInput, defaults: &'a ProcessDefaults) -> Self {
        Self {
            network: resolve(input.network.as_deref(), defaults.network.as_deref()),
            facilitator_url: resolve(
                input.facilitator_url.as_deref(),
                defaults.facilitator_url.as_deref(),
            ),
            receivable_address: resolve(
                input.receivable_address.as_deref(),
                defaults.receivable_address.as_deref(),
            ),
        }
    }
}

/// Input value, then process default, then absent. Empty strings count as absent.
pub fn resolve<'a>(input: Option<&'a str>, process_default: Option<&'a str>) -> Option<&'a str> {
    input
        .filter(|v| !v.is_empty())
        .or(process_default.filter(|v| !v.is_empty()))
}

/// `0x` followed by exactly 40 hex characters, any case.
pub fn is_valid_receivable_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_input() {
        assert_eq!(resolve(Some("base"), Some("ethereum")), Some("base"));
    }

    #[test]
    fn test_resolve_falls_back_to_process_default() {
        assert_eq!(resolve(None, Some("ethereum")), Some("ethereum"));
        assert_eq!(resolve(Some(""), Some("ethereum")), Some("ethereum"));
    }

    #[test]
    fn test_resolve_absent() {
        assert_eq!(resolve(None, None), None);
        assert_eq!(resolve(Some(""), Some("")), None);
    }

    #[test]
    fn test_process_defaults_keep_unset_variables_absent() {
        let defaults = ProcessDefaults::from_lookup(|name| match name {
            "NETWORK" => Some("base".to_string()),
            "FACILITATOR_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(defaults.network.as_deref(), Some("base"));
        assert_eq!(defaults.facilitator_url, None);
        assert_eq!(defaults.receivable_address, None);
    }

    #[test]
    fn test_receivable_address_pattern() {
        assert!(is_valid_receivable_address(
            "0x1234567890abcdef1234567890ABCDEF12345678"
        ));
        assert!(!is_valid_receivable_address(
            "1234567890abcdef1234567890abcdef12345678"
        ));
        assert!(!is_valid_receivable_address("0x1234"));
        assert!(!is_valid_receivable_address(
            "0x1234567890abcdef1234567890abcdef1234567g"
        ));
        assert!(!is_valid_receivable_address(
            "0X1234567890abcdef1234567890abcdef12345678"
        ));
    }

    #[test]
    fn test_route_defaults_from_json() {
        let route: RoutePolicy = serde_json::from_str(r#"{"path":"/api/research"}"#).unwrap();
        assert_eq!(route.method, "POST");
        assert!(!route.requires_payment);
        assert!(route.price_usd.is_none());
    }

    #[test]
    fn test_route_accepts_legacy_alias() {
        let route: RoutePolicy =
            serde_json::from_str(r#"{"path":"/a","requiresX402":true,"priceUsd":0.03}"#).unwrap();
        assert!(route.requires_payment);
        assert_eq!(route.positive_price(), Some(0.03));
    }

    #[test]
    fn test_empty_app_name_gets_placeholder() {
        let input = AnalysisInput::new("", vec![RoutePolicy::new("/a")]);
        assert_eq!(input.app_name, "unknown-app");
    }
}
