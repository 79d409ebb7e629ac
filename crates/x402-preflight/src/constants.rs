/// x402 protocol version carried in 402 bodies and verify requests.
pub const X402_VERSION: u32 = 1;

/// Payment scheme advertised in `accepts` entries.
pub const SCHEME_NAME: &str = "exact";

/// USDC has 6 decimal places.
pub const TOKEN_DECIMALS: u32 = 6;

/// Primary request header carrying the payment proof.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Fallback proof header used by some x402 clients.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Response header echoing the verification receipt.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Price the analyzer recommends for paid endpoints, in USD.
pub const DEFAULT_BASELINE_PRICE_USD: f64 = 0.03;

/// Placeholder network written into generated patches.
pub const PATCH_NETWORK: &str = "base";

/// Placeholder facilitator written into generated patches.
pub const PATCH_FACILITATOR_URL: &str = "https://facilitator.example.com";

/// `appName` used when the caller supplies none.
pub const DEFAULT_APP_NAME: &str = "unknown-app";

/// Score weight per high-severity finding.
pub const HIGH_WEIGHT: u32 = 22;

/// Score weight per medium-severity finding.
pub const MEDIUM_WEIGHT: u32 = 10;

/// Score weight per low-severity finding.
pub const LOW_WEIGHT: u32 = 4;

/// Exposure added per paid route.
pub const EXPOSURE_PER_PAID_ROUTE: u32 = 2;

/// Ceiling on the paid-route exposure term.
pub const MAX_EXPOSURE: u32 = 12;

/// Scores at or above this are `high-risk`.
pub const HIGH_RISK_THRESHOLD: u32 = 70;

/// Scores at or above this (and below [`HIGH_RISK_THRESHOLD`]) need hardening.
pub const NEEDS_HARDENING_THRESHOLD: u32 = 35;

/// Maximum number of patch suggestions in a result.
pub const MAX_PATCH_SUGGESTIONS: usize = 6;
