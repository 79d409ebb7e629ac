use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;

pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("preflight_requests_total", "Total HTTP requests"),
        &["endpoint", "status"],
    )
    .unwrap()
});

// enforced | bypassed | fail_open
pub static GATE_DECISIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "preflight_gate_decisions_total",
            "Payment gate decisions on priced routes",
        ),
        &["outcome"],
    )
    .unwrap()
});

// valid | invalid | unavailable
pub static VERIFICATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "preflight_payment_verifications_total",
            "Payment proof verification attempts",
        ),
        &["result"],
    )
    .unwrap()
});

pub static ANALYSES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("preflight_analyses_total", "Compliance analyses by verdict"),
        &["verdict"],
    )
    .unwrap()
});

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let registry = Registry::new();
    registry.register(Box::new(REQUESTS.clone())).unwrap();
    registry.register(Box::new(GATE_DECISIONS.clone())).unwrap();
    registry.register(Box::new(VERIFICATIONS.clone())).unwrap();
    registry.register(Box::new(ANALYSES.clone())).unwrap();
    registry
});

/// Register all metrics with the registry. Safe to call more than once.
pub fn register_metrics() {
    LazyLock::force(&REGISTRY);
}

pub fn metrics_output() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_lists_counters() {
        ANALYSES.with_label_values(&["compatible"]).inc();
        let output = metrics_output().unwrap();
        assert!(output.contains("preflight_analyses_total"));
    }
}
