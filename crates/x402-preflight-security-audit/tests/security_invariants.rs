//! Source-level invariants for the x402 preflight workspace.
//!
//! These scan the production sources so a change that weakens payment
//! enforcement, analyzer determinism or secret handling fails CI.

use regex::Regex;
use std::path::Path;
use walkdir::WalkDir;

/// Read all .rs source files from production crates (excluding tests and this crate).
fn production_source_files() -> Vec<(String, String)> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap();

    let mut files = Vec::new();
    for entry in WalkDir::new(root.join("crates"))
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }

        let path_str = path.to_str().unwrap_or("");
        if path_str.contains("security-audit")
            || path_str.contains("tests/")
            || path_str.contains("\\tests\\")
        {
            continue;
        }

        if let Ok(content) = std::fs::read_to_string(path) {
            files.push((path_str.replace('\\', "/"), content));
        }
    }

    files
}

fn source_file(suffix: &str) -> String {
    production_source_files()
        .into_iter()
        .find(|(path, _)| path.ends_with(suffix))
        .map(|(_, content)| content)
        .unwrap_or_else(|| panic!("{suffix} not found"))
}

/// Drop everything from the first `#[cfg(test)]` onward.
fn production_lines(content: &str) -> String {
    let mut result = Vec::new();
    for line in content.lines() {
        if line.contains("#[cfg(test)]") || line.trim().starts_with("mod tests") {
            break;
        }
        result.push(line);
    }
    result.join("\n")
}

#[test]
fn no_hardcoded_private_keys_in_production_code() {
    let hex_64_re = Regex::new(r"0x[a-fA-F0-9]{64}").unwrap();

    for (path, content) in &production_source_files() {
        let prod = production_lines(content);
        if let Some(mat) = hex_64_re.find(&prod) {
            let line_num = prod[..mat.start()].lines().count();
            panic!("Potential hardcoded secret found at {path}:{line_num}");
        }
    }
}

#[test]
fn analyzer_has_no_clock_randomness_or_env() {
    let forbidden = Regex::new(r"std::env|env::var|SystemTime|Instant::now|chrono|rand::|uuid").unwrap();

    for file in [
        "x402-preflight/src/analyzer.rs",
        "x402-preflight/src/finding.rs",
        "x402-preflight/src/policy.rs",
    ] {
        let prod = production_lines(&source_file(file));
        assert!(
            !forbidden.is_match(&prod),
            "{file} must stay deterministic: found {:?}",
            forbidden.find(&prod).map(|m| m.as_str())
        );
    }
}

#[test]
fn http_clients_disable_redirects() {
    for (path, content) in &production_source_files() {
        let prod = production_lines(content);
        assert!(
            !prod.contains("reqwest::Client::new()"),
            "{path}: build clients with Client::builder() and a redirect policy"
        );
        if prod.contains("reqwest::Client::builder()") {
            assert!(
                prod.contains("redirect(reqwest::redirect::Policy::none())"),
                "{path}: HTTP client must disable redirects"
            );
        }
    }
}

#[test]
fn scoring_constants_keep_contract_values() {
    let constants = source_file("x402-preflight/src/constants.rs");
    for expected in [
        "HIGH_WEIGHT: u32 = 22;",
        "MEDIUM_WEIGHT: u32 = 10;",
        "LOW_WEIGHT: u32 = 4;",
        "EXPOSURE_PER_PAID_ROUTE: u32 = 2;",
        "MAX_EXPOSURE: u32 = 12;",
        "HIGH_RISK_THRESHOLD: u32 = 70;",
        "NEEDS_HARDENING_THRESHOLD: u32 = 35;",
        "MAX_PATCH_SUGGESTIONS: usize = 6;",
    ] {
        assert!(
            constants.contains(expected),
            "scoring contract changed: expected `{expected}` in constants.rs"
        );
    }
}

#[test]
fn rpc_fail_open_path_is_logged() {
    let gate = production_lines(&source_file("x402-preflight/src/gate.rs"));
    let start = gate
        .find("MalformedRpcPolicy::Bypass =>")
        .expect("fail-open branch not found in gate.rs");
    let branch = &gate[start..(start + 300).min(gate.len())];
    assert!(
        branch.contains("tracing::warn!"),
        "bypassing payment for an unreadable JSON-RPC body must log a warning"
    );
}

#[test]
fn missing_proof_never_reaches_verifier() {
    let gate = production_lines(&source_file("x402-preflight/src/gate.rs"));
    let proof_check = gate
        .find("let Some(proof)")
        .expect("proof presence check not found in gate.rs");
    let verify_call = gate
        .find(".verify(")
        .expect("verifier call not found in gate.rs");
    assert!(
        proof_check < verify_call,
        "the proof must be checked before the verifier is called"
    );
}

#[test]
fn gate_is_keyed_on_the_routed_path() {
    let middleware = production_lines(&source_file("x402-preflight-server/src/middleware.rs"));
    assert!(
        middleware.contains("match_info().as_str()"),
        "the gate must price the decoded path the router matches on"
    );
    assert!(
        !middleware.contains("req.path()"),
        "the raw request path can differ from the routed path"
    );
}

#[test]
fn metrics_token_uses_constant_time_comparison() {
    let security = production_lines(&source_file("x402-preflight-server/src/security.rs"));
    assert!(security.contains("ct_eq"), "security.rs must compare with subtle");

    let health = production_lines(&source_file("x402-preflight-server/src/routes/health.rs"));
    assert!(
        health.contains("bearer_matches"),
        "/metrics must check the token through security::bearer_matches"
    );
    let naive = Regex::new(r"==\s*\*?expected").unwrap();
    assert!(!naive.is_match(&health), "naive token comparison in health.rs");
}

#[test]
fn config_debug_redacts_secrets() {
    let config = production_lines(&source_file("x402-preflight-server/src/config.rs"));
    assert!(
        !Regex::new(r"#\[derive\([^)]*Debug[^)]*\)\]\s*pub struct ServerConfig")
            .unwrap()
            .is_match(&config),
        "ServerConfig must implement Debug by hand to redact secrets"
    );
    for field in ["\"hmac_secret\"", "\"metrics_token\""] {
        let at = config
            .find(field)
            .unwrap_or_else(|| panic!("{field} missing from Debug impl"));
        let window = &config[at..(at + 120).min(config.len())];
        assert!(window.contains("[REDACTED]"), "{field} is not redacted");
    }
}

#[test]
fn core_production_code_does_not_panic_on_input() {
    let panicky = Regex::new(r"\.unwrap\(\)|\.expect\(|panic!\(").unwrap();
    for (path, content) in &production_source_files() {
        if !path.contains("x402-preflight/src/") {
            continue;
        }
        let prod = production_lines(content);
        assert!(
            !panicky.is_match(&prod),
            "{path}: core code must propagate errors instead of panicking"
        );
    }
}
