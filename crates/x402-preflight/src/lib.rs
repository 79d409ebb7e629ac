//! x402 payment gating and route policy compliance analysis.
//!
//! Two independent pieces share one model of "route payment policy":
//!
//! - **Gate** ([`PaymentGate`]): decides per request whether a payment proof
//!   must be verified, peeking the JSON-RPC `method` when one priced path
//!   multiplexes operations with different costs
//! - **Analyzer** ([`ComplianceAnalyzer`]): audits a declared route list for
//!   x402 wiring defects and scores the risk
//!
//! # Quick example (analyzer)
//!
//! ```
//! use preflight::{analyze, AnalysisInput, ProcessDefaults, RoutePolicy, Verdict};
//!
//! let input = AnalysisInput::new(
//!     "research-agent",
//!     vec![RoutePolicy::new("/api/research").paid(0.03)],
//! )
//! .network("base")
//! .facilitator("https://facilitator.example.com")
//! .receivable("0x1111111111111111111111111111111111111111");
//!
//! let result = analyze(&input, &ProcessDefaults::default());
//! assert_eq!(result.risk_score, 2);
//! assert_eq!(result.verdict, Verdict::Compatible);
//! ```

// Shared model
pub mod constants;
pub mod error;
pub mod finding;
pub mod policy;
pub mod validation;

// Analysis
pub mod analyzer;

// Payment gating
pub mod gate;
pub mod payment;
pub mod price;
pub mod verifier;

pub use analyzer::{
    analyze, AnalysisResult, AnalysisSummary, ComplianceAnalyzer, InvokeExample,
    LocalInvokeExamples, PatchSuggestion, Verdict,
};
pub use error::{GateError, VerifierError};
pub use finding::{Finding, FindingCode, RouteRef, Severity};
pub use gate::{
    BypassReason, GateDecision, GateOutcome, InboundRequest, MalformedRpcPolicy, PaymentGate,
    PaymentGateBuilder,
};
pub use payment::{PaymentReceipt, PaymentRequiredBody, PaymentRequirements};
pub use policy::{AnalysisInput, ProcessDefaults, RoutePolicy};
pub use validation::ValidationError;
pub use verifier::{PaymentVerifier, VerificationOutcome, VerificationRequest};
