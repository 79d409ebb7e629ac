use alloy::primitives::Address;
use preflight::{GateError, MalformedRpcPolicy, PaymentGate, ProcessDefaults};
use std::env;
use url::Url;

const DEFAULT_NETWORK: &str = "eip155:84532";
const DEFAULT_FACILITATOR_URL: &str = "https://www.x402.org/facilitator";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RATE_LIMIT_RPM: u32 = 60;

/// Priced REST route serving the full compatibility report.
pub const DEEP_REPORT_PATH: &str = "/api/preflight-x402/invoke";
pub const DEEP_REPORT_PRICE: &str = "$0.03";

/// JSON-RPC agent endpoint. Only [`PAID_A2A_METHODS`] are charged.
pub const A2A_PATH: &str = "/a2a";
pub const A2A_PRICE: &str = "$0.01";
pub const PAID_A2A_METHODS: [&str; 2] = ["message/send", "message/stream"];

#[derive(Clone)]
pub struct ServerConfig {
    /// Receivable address payments settle to
    pub wallet_address: Address,
    /// Network identifier advertised in 402 responses
    pub network: String,
    /// Facilitator URL for payment verification
    pub facilitator_url: String,
    /// HMAC shared secret for facilitator auth (None = unsigned requests)
    pub hmac_secret: Option<Vec<u8>>,
    pub port: u16,
    /// CORS allowed origins
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute
    pub rate_limit_rpm: u32,
    /// Bearer token required for /metrics endpoint (None = public)
    pub metrics_token: Option<String>,
    /// Handling of JSON-RPC bodies whose method cannot be read
    pub malformed_rpc_policy: MalformedRpcPolicy,
    /// Process tier of the analyzer's settings resolution, read raw
    pub analyzer_defaults: ProcessDefaults,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("wallet_address", &self.wallet_address)
            .field("network", &self.network)
            .field("facilitator_url", &self.facilitator_url)
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("malformed_rpc_policy", &self.malformed_rpc_policy)
            .field("analyzer_defaults", &self.analyzer_defaults)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // Required: receivable wallet
        let wallet_str =
            var("WALLET_ADDRESS").ok_or(ConfigError::MissingRequired("WALLET_ADDRESS"))?;
        let wallet_address: Address = wallet_str
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(wallet_str.clone()))?;

        let network = var("NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());

        let facilitator_url =
            var("FACILITATOR_URL").unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string());
        Url::parse(&facilitator_url)
            .map_err(|_| ConfigError::InvalidUrl(facilitator_url.clone()))?;

        let hmac_secret = var("FACILITATOR_SHARED_SECRET").map(String::into_bytes);
        match hmac_secret {
            Some(ref secret) if secret.len() < 32 => tracing::warn!(
                "FACILITATOR_SHARED_SECRET is too short ({} bytes, minimum 32)",
                secret.len()
            ),
            Some(_) => {}
            None => tracing::warn!(
                "FACILITATOR_SHARED_SECRET not set, facilitator requests will be unsigned"
            ),
        }

        let port = var("PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let allowed_origins: Vec<String> = var("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        let rate_limit_rpm = var("RATE_LIMIT_RPM")
            .and_then(|s| s.trim().parse().ok())
            .filter(|rpm| *rpm > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        let metrics_token = var("METRICS_TOKEN");
        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is publicly accessible");
        }

        let malformed_rpc_policy = match var("X402_RPC_MALFORMED_POLICY") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "X402_RPC_MALFORMED_POLICY",
                value,
            })?,
            None => MalformedRpcPolicy::default(),
        };
        if malformed_rpc_policy == MalformedRpcPolicy::Bypass {
            tracing::warn!(
                "unreadable JSON-RPC bodies on {A2A_PATH} bypass payment; \
                 set X402_RPC_MALFORMED_POLICY=enforce to fail closed"
            );
        }

        // The analyzer sees the raw variables so an unset environment is reported.
        let analyzer_defaults = ProcessDefaults::from_lookup(&lookup);

        Ok(Self {
            wallet_address,
            network,
            facilitator_url,
            hmac_secret,
            port,
            allowed_origins,
            rate_limit_rpm,
            metrics_token,
            malformed_rpc_policy,
            analyzer_defaults,
        })
    }

    /// The service's price table.
    pub fn payment_gate(&self) -> Result<PaymentGate, GateError> {
        PaymentGate::builder(
            self.wallet_address,
            self.network.clone(),
            self.facilitator_url.clone(),
        )
        .route(
            "POST",
            DEEP_REPORT_PATH,
            DEEP_REPORT_PRICE,
            Some("Deep compatibility report"),
        )
        .rpc_endpoint(
            A2A_PATH,
            A2A_PRICE,
            Some("A2A task execution"),
            PAID_A2A_METHODS,
        )
        .malformed_rpc_policy(self.malformed_rpc_policy)
        .build()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid price table: {0}")]
    Gate(#[from] GateError),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_wallet_is_required() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingRequired("WALLET_ADDRESS"))
        ));
        assert!(matches!(
            load(&[("WALLET_ADDRESS", "not-an-address")]),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("WALLET_ADDRESS", WALLET)]).unwrap();
        assert_eq!(config.network, "eip155:84532");
        assert_eq!(config.facilitator_url, "https://www.x402.org/facilitator");
        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_rpm, 60);
        assert_eq!(config.allowed_origins, vec!["*"]);
        assert_eq!(config.malformed_rpc_policy, MalformedRpcPolicy::Bypass);
        assert!(config.hmac_secret.is_none());
        assert!(config.metrics_token.is_none());
        // Serving defaults never leak into the analyzer's view of the environment.
        assert_eq!(config.analyzer_defaults, ProcessDefaults::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WALLET_ADDRESS", WALLET),
            ("NETWORK", "base"),
            ("FACILITATOR_URL", "https://facilitator.example.com"),
            ("PAYMENTS_RECEIVABLE_ADDRESS", WALLET),
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("X402_RPC_MALFORMED_POLICY", "enforce"),
        ])
        .unwrap();
        assert_eq!(config.network, "base");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.malformed_rpc_policy, MalformedRpcPolicy::Enforce);
        assert_eq!(config.analyzer_defaults.network.as_deref(), Some("base"));
        assert_eq!(
            config.analyzer_defaults.receivable_address.as_deref(),
            Some(WALLET)
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            load(&[("WALLET_ADDRESS", WALLET), ("FACILITATOR_URL", "not a url")]),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            load(&[("WALLET_ADDRESS", WALLET), ("X402_RPC_MALFORMED_POLICY", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[
            ("WALLET_ADDRESS", WALLET),
            ("FACILITATOR_SHARED_SECRET", "super-secret-value"),
            ("METRICS_TOKEN", "metrics-token-value"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("metrics-token-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_price_table() {
        let config = load(&[("WALLET_ADDRESS", WALLET)]).unwrap();
        let gate = config.payment_gate().unwrap();
        let report = gate.get_route("POST", DEEP_REPORT_PATH).unwrap();
        assert_eq!(report.requirements.max_amount_required, "30000");
        let a2a = gate.get_route("POST", A2A_PATH).unwrap();
        assert_eq!(a2a.requirements.max_amount_required, "10000");
        assert!(gate.get_route("POST", "/api/preflight-x402").is_none());
    }
}
