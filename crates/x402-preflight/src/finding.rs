use serde::{Deserialize, Serialize};

/// Finding severity. Ordering is `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Whether a rule looks at global settings or at one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Route,
}

/// The fixed rule catalog. Each variant is one stable machine-readable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    MissingNetwork,
    MissingFacilitator,
    InvalidReceivableAddress,
    PaidRouteWithoutPrice,
    FreeRouteWithPrice,
    RouteMissingFacilitator,
    RouteMissingReceivable,
}

impl FindingCode {
    /// Global rules in evaluation order.
    pub const GLOBAL: [FindingCode; 3] = [
        FindingCode::MissingNetwork,
        FindingCode::MissingFacilitator,
        FindingCode::InvalidReceivableAddress,
    ];

    /// Per-route rules in evaluation order.
    pub const PER_ROUTE: [FindingCode; 4] = [
        FindingCode::PaidRouteWithoutPrice,
        FindingCode::FreeRouteWithPrice,
        FindingCode::RouteMissingFacilitator,
        FindingCode::RouteMissingReceivable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FindingCode::MissingNetwork => "MISSING_NETWORK",
            FindingCode::MissingFacilitator => "MISSING_FACILITATOR",
            FindingCode::InvalidReceivableAddress => "INVALID_RECEIVABLE_ADDRESS",
            FindingCode::PaidRouteWithoutPrice => "PAID_ROUTE_WITHOUT_PRICE",
            FindingCode::FreeRouteWithPrice => "FREE_ROUTE_WITH_PRICE",
            FindingCode::RouteMissingFacilitator => "ROUTE_MISSING_FACILITATOR",
            FindingCode::RouteMissingReceivable => "ROUTE_MISSING_RECEIVABLE",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            FindingCode::FreeRouteWithPrice => Severity::Medium,
            _ => Severity::High,
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            FindingCode::MissingNetwork
            | FindingCode::MissingFacilitator
            | FindingCode::InvalidReceivableAddress => Scope::Global,
            _ => Scope::Route,
        }
    }
}

impl std::fmt::Display for FindingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route a finding is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRef {
    pub method: String,
    pub path: String,
}

/// One detected configuration defect ("breakpoint").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    pub finding: String,
    pub impact: String,
    pub remediation: String,
    pub patch_suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_code_wire_names_match_as_str() {
        for code in FindingCode::GLOBAL.into_iter().chain(FindingCode::PER_ROUTE) {
            let wire = serde_json::to_value(code).unwrap();
            assert_eq!(wire, code.as_str());
        }
    }

    #[test]
    fn test_catalog_scopes_and_severities() {
        for code in FindingCode::GLOBAL {
            assert_eq!(code.scope(), Scope::Global);
            assert_eq!(code.severity(), Severity::High);
        }
        for code in FindingCode::PER_ROUTE {
            assert_eq!(code.scope(), Scope::Route);
        }
        assert_eq!(FindingCode::FreeRouteWithPrice.severity(), Severity::Medium);
    }
}
