//! Route policy compliance analyzer.
//!
//! Pure and deterministic: the only inputs are the [`AnalysisInput`], the
//! [`ProcessDefaults`] tier of the resolution chain, and the constants in
//! [`crate::constants`]. Safe to call concurrently from any number of tasks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASELINE_PRICE_USD, EXPOSURE_PER_PAID_ROUTE, HIGH_RISK_THRESHOLD, HIGH_WEIGHT,
    LOW_WEIGHT, MAX_EXPOSURE, MAX_PATCH_SUGGESTIONS, MEDIUM_WEIGHT, NEEDS_HARDENING_THRESHOLD,
    PATCH_FACILITATOR_URL, PATCH_NETWORK,
};
use crate::finding::{Finding, FindingCode, RouteRef, Scope, Severity};
use crate::policy::{
    is_valid_receivable_address, AnalysisInput, ProcessDefaults, ResolvedGlobals, RoutePolicy,
};

pub const RISK_FORMULA: &str =
    "score = min(100, high*22 + medium*10 + low*4 + paidRouteExposure)";

const NORMALIZE_STEP: &str =
    "Normalize env: NETWORK, FACILITATOR_URL, PAYMENTS_RECEIVABLE_ADDRESS.";
const INTEGRATION_TEST_STEP: &str =
    "Add integration test: unpaid call returns 402; paid call succeeds.";

const FREE_ENTRYPOINT: &str = "/entrypoints/preflight-x402-free/invoke";
const FREE_ENTRYPOINT_CURL: &str = r#"curl -s http://localhost:3000/entrypoints/preflight-x402-free/invoke \
  -H 'Content-Type: application/json' \
  -d '{
    "input": {
      "appName": "demo-api",
      "routes": [
        { "path": "/api/research", "method": "POST", "requiresPayment": true, "priceUsd": 0.03 },
        { "path": "/health", "method": "GET", "requiresPayment": false }
      ]
    }
  }'"#;

const DIRECT_ROUTE: &str = "/api/preflight-x402";
const DIRECT_ROUTE_CURL: &str = r#"curl -s http://localhost:3000/api/preflight-x402 \
  -H 'Content-Type: application/json' \
  -d '{
    "appName": "demo-api",
    "routes": [
      { "path": "/api/research", "method": "POST", "requiresPayment": true, "priceUsd": 0.03 }
    ]
  }'"#;

/// Coarse classification derived from the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Compatible,
    NeedsHardening,
    HighRisk,
}

impl Verdict {
    pub fn from_score(score: u32) -> Self {
        if score >= HIGH_RISK_THRESHOLD {
            Verdict::HighRisk
        } else if score >= NEEDS_HARDENING_THRESHOLD {
            Verdict::NeedsHardening
        } else {
            Verdict::Compatible
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Compatible => "compatible",
            Verdict::NeedsHardening => "needs-hardening",
            Verdict::HighRisk => "high-risk",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    fn tally(findings: &[Finding]) -> Self {
        findings
            .iter()
            .fold(Self::default(), |mut counts, f| {
                match f.severity {
                    Severity::High => counts.high += 1,
                    Severity::Medium => counts.medium += 1,
                    Severity::Low => counts.low += 1,
                }
                counts
            })
    }

    /// `22×high + 10×medium + 4×low`.
    pub fn weighted(&self) -> u32 {
        let weight = |count: usize, w: u32| {
            u32::try_from(count)
                .unwrap_or(u32::MAX)
                .saturating_mul(w)
        };
        weight(self.high, HIGH_WEIGHT)
            .saturating_add(weight(self.medium, MEDIUM_WEIGHT))
            .saturating_add(weight(self.low, LOW_WEIGHT))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskModel {
    pub formula: String,
    pub weighted: u32,
    pub paid_route_exposure: u32,
    pub paid_routes: usize,
    pub total_routes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub total_breakpoints: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSuggestion {
    pub id: String,
    pub code: FindingCode,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteRef>,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeExample {
    pub endpoint: String,
    pub command: String,
}

/// Ready-to-run requests against a local instance of this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalInvokeExamples {
    pub free_entrypoint: InvokeExample,
    pub direct_route: InvokeExample,
}

impl Default for LocalInvokeExamples {
    fn default() -> Self {
        Self {
            free_entrypoint: InvokeExample {
                endpoint: FREE_ENTRYPOINT.to_string(),
                command: FREE_ENTRYPOINT_CURL.to_string(),
            },
            direct_route: InvokeExample {
                endpoint: DIRECT_ROUTE.to_string(),
                command: DIRECT_ROUTE_CURL.to_string(),
            },
        }
    }
}

/// Output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub app_name: String,
    pub baseline_price_usd: f64,
    pub risk_score: u32,
    pub verdict: Verdict,
    pub risk_model: RiskModel,
    pub summary: ResultSummary,
    #[serde(rename = "breakpoints")]
    pub findings: Vec<Finding>,
    pub remediation_steps: Vec<String>,
    pub patch_suggestions: Vec<PatchSuggestion>,
    pub local_invoke_examples: LocalInvokeExamples,
}

/// Trimmed surface of an [`AnalysisResult`]: score, verdict and counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub baseline_price_usd: f64,
    pub risk_score: u32,
    pub verdict: Verdict,
    pub counts: SeverityCounts,
}

impl From<&AnalysisResult> for AnalysisSummary {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            baseline_price_usd: result.baseline_price_usd,
            risk_score: result.risk_score,
            verdict: result.verdict,
            counts: SeverityCounts {
                high: result.summary.high,
                medium: result.summary.medium,
                low: result.summary.low,
            },
        }
    }
}

/// Analyzer bound to one set of process defaults.
#[derive(Debug, Clone, Default)]
pub struct ComplianceAnalyzer {
    defaults: ProcessDefaults,
}

impl ComplianceAnalyzer {
    pub fn new(defaults: ProcessDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ProcessDefaults {
        &self.defaults
    }

    pub fn analyze(&self, input: &AnalysisInput) -> AnalysisResult {
        analyze(input, &self.defaults)
    }
}

/// What a rule is evaluated against.
#[derive(Debug, Clone, Copy)]
enum RuleTarget<'a> {
    Global,
    Route(&'a RoutePolicy),
}

impl RuleTarget<'_> {
    fn scope(self) -> Scope {
        match self {
            RuleTarget::Global => Scope::Global,
            RuleTarget::Route(_) => Scope::Route,
        }
    }
}

/// Run every rule against `input` and score the result.
pub fn analyze(input: &AnalysisInput, defaults: &ProcessDefaults) -> AnalysisResult {
    let globals = ResolvedGlobals::resolve(input, defaults);

    let mut findings: Vec<Finding> = FindingCode::GLOBAL
        .into_iter()
        .filter_map(|code| evaluate(code, RuleTarget::Global, &globals))
        .collect();
    for route in &input.routes {
        findings.extend(
            FindingCode::PER_ROUTE
                .into_iter()
                .filter_map(|code| evaluate(code, RuleTarget::Route(route), &globals)),
        );
    }

    // Stable: ties keep detection order.
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));

    let counts = SeverityCounts::tally(&findings);
    let paid_routes = input.paid_route_count();
    let weighted = counts.weighted();
    let exposure = paid_route_exposure(paid_routes);
    let risk_score = weighted.saturating_add(exposure).min(100);
    let verdict = Verdict::from_score(risk_score);

    let remediation_steps = remediation_steps(&findings);
    let patch_suggestions = patch_suggestions(&findings);

    AnalysisResult {
        app_name: input.app_name.clone(),
        baseline_price_usd: DEFAULT_BASELINE_PRICE_USD,
        risk_score,
        verdict,
        risk_model: RiskModel {
            formula: RISK_FORMULA.to_string(),
            weighted,
            paid_route_exposure: exposure,
            paid_routes,
            total_routes: input.routes.len(),
        },
        summary: ResultSummary {
            total_breakpoints: findings.len(),
            high: counts.high,
            medium: counts.medium,
            low: counts.low,
            verdict,
        },
        findings,
        remediation_steps,
        patch_suggestions,
        local_invoke_examples: LocalInvokeExamples::default(),
    }
}

/// `min(12, 2×paidRoutes)`, zero without paid routes.
pub fn paid_route_exposure(paid_routes: usize) -> u32 {
    u32::try_from(paid_routes)
        .unwrap_or(u32::MAX)
        .saturating_mul(EXPOSURE_PER_PAID_ROUTE)
        .min(MAX_EXPOSURE)
}

fn evaluate(
    code: FindingCode,
    target: RuleTarget<'_>,
    globals: &ResolvedGlobals<'_>,
) -> Option<Finding> {
    if code.scope() != target.scope() {
        return None;
    }

    let fires = match (code, target) {
        (FindingCode::MissingNetwork, RuleTarget::Global) => globals.network.is_none(),
        (FindingCode::MissingFacilitator, RuleTarget::Global) => globals.facilitator_url.is_none(),
        (FindingCode::InvalidReceivableAddress, RuleTarget::Global) => !globals
            .receivable_address
            .is_some_and(is_valid_receivable_address),
        (FindingCode::PaidRouteWithoutPrice, RuleTarget::Route(route)) => {
            route.requires_payment && route.positive_price().is_none()
        }
        (FindingCode::FreeRouteWithPrice, RuleTarget::Route(route)) => {
            !route.requires_payment && route.positive_price().is_some()
        }
        (FindingCode::RouteMissingFacilitator, RuleTarget::Route(route)) => {
            route.requires_payment
                && route.facilitator_url.as_deref().is_none_or(str::is_empty)
                && globals.facilitator_url.is_none()
        }
        (FindingCode::RouteMissingReceivable, RuleTarget::Route(route)) => {
            route.requires_payment
                && !route
                    .receivable_address
                    .as_deref()
                    .is_some_and(is_valid_receivable_address)
                && !globals
                    .receivable_address
                    .is_some_and(is_valid_receivable_address)
        }
        _ => false,
    };

    if !fires {
        return None;
    }

    Some(match target {
        RuleTarget::Global => global_finding(code),
        RuleTarget::Route(route) => route_finding(code, route),
    })
}

fn global_finding(code: FindingCode) -> Finding {
    let (finding, impact, remediation) = match code {
        FindingCode::MissingNetwork => (
            "No x402 network configured.",
            "Payment verification may fail across all paid routes.",
            "Set NETWORK (e.g. base, base-sepolia, ethereum) and keep it consistent.",
        ),
        FindingCode::MissingFacilitator => (
            "No facilitator URL configured.",
            "x402 proofs cannot be verified at runtime.",
            "Configure FACILITATOR_URL.",
        ),
        _ => (
            "PAYMENTS_RECEIVABLE_ADDRESS missing or invalid.",
            "Payments may fail to settle or settle to the wrong target.",
            "Set a valid EVM address for receivables.",
        ),
    };

    Finding {
        severity: code.severity(),
        code,
        finding: finding.to_string(),
        impact: impact.to_string(),
        remediation: remediation.to_string(),
        patch_suggestion: env_patch(),
        route: None,
    }
}

fn route_finding(code: FindingCode, route: &RoutePolicy) -> Finding {
    let method = route.method_upper();
    let path = &route.path;
    let declared_price = route.price_usd.unwrap_or(DEFAULT_BASELINE_PRICE_USD);

    let (finding, impact, remediation, patch) = match code {
        FindingCode::PaidRouteWithoutPrice => (
            format!("{method} {path} is marked paid but has no positive price."),
            "Route policy is ambiguous and may fail closed/open unexpectedly.",
            "Set explicit priceUsd > 0 for paid routes.",
            route_guard_patch(route, DEFAULT_BASELINE_PRICE_USD),
        ),
        FindingCode::FreeRouteWithPrice => (
            format!("{method} {path} has a price but is not marked requiresPayment."),
            "Developers may assume free access while clients are charged.",
            "Either mark route as requiresPayment or remove price.",
            format!("// For {method} {path}: set requiresPayment: true (or remove priceUsd)."),
        ),
        FindingCode::RouteMissingFacilitator => (
            format!("{method} {path} is paid but has no facilitator configured."),
            "Payment proof checks cannot execute.",
            "Provide facilitatorUrl at route or top level.",
            route_guard_patch(route, declared_price),
        ),
        _ => (
            format!("{method} {path} is paid but has no valid receivable address."),
            "Successful payments cannot be safely settled.",
            "Set route.receivableAddress or PAYMENTS_RECEIVABLE_ADDRESS to a valid EVM address.",
            route_guard_patch(route, declared_price),
        ),
    };

    Finding {
        severity: code.severity(),
        code,
        finding,
        impact: impact.to_string(),
        remediation: remediation.to_string(),
        patch_suggestion: patch,
        route: Some(RouteRef {
            method,
            path: path.clone(),
        }),
    }
}

fn env_patch() -> String {
    format!(
        "# x402 runtime defaults\n\
         export NETWORK={PATCH_NETWORK}\n\
         export FACILITATOR_URL={PATCH_FACILITATOR_URL}\n\
         export PAYMENTS_RECEIVABLE_ADDRESS=0xYour40HexAddress"
    )
}

fn route_guard_patch(route: &RoutePolicy, price: f64) -> String {
    let method_upper = route.method.to_uppercase();
    let method_lower = route.method.to_lowercase();
    let path = &route.path;
    format!(
        "// Example x402 guard for {method_upper} {path}\n\
         app.{method_lower}(\"{path}\", x402({{\n  \
           network: process.env.NETWORK ?? \"{PATCH_NETWORK}\",\n  \
           facilitatorUrl: process.env.FACILITATOR_URL ?? \"{PATCH_FACILITATOR_URL}\",\n  \
           payTo: process.env.PAYMENTS_RECEIVABLE_ADDRESS,\n  \
           priceUsd: {price},\n\
         }}), handler);\n"
    )
}

fn remediation_steps(findings: &[Finding]) -> Vec<String> {
    let baseline_step = format!(
        "Pin baseline paid endpoint pricing at ${DEFAULT_BASELINE_PRICE_USD:.2} unless endpoint-specific override is justified."
    );

    let candidates = std::iter::once(NORMALIZE_STEP.to_string())
        .chain(findings.iter().map(|f| f.remediation.clone()))
        .chain([INTEGRATION_TEST_STEP.to_string(), baseline_step]);

    let mut seen = HashSet::new();
    candidates
        .filter(|step| seen.insert(step.clone()))
        .collect()
}

fn patch_suggestions(findings: &[Finding]) -> Vec<PatchSuggestion> {
    findings
        .iter()
        .take(MAX_PATCH_SUGGESTIONS)
        .enumerate()
        .map(|(idx, f)| PatchSuggestion {
            id: format!("patch-{}", idx + 1),
            code: f.code,
            severity: f.severity,
            route: f.route.clone(),
            suggestion: f.patch_suggestion.clone(),
        })
        .collect()
}
