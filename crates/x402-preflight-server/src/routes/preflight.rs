//! Compliance analysis endpoints.
//!
//! All four surfaces run the same analysis; they differ only in body shape
//! (bare input or `{ input }` envelope) and in how much of the result they
//! return.

use actix_web::{web, HttpResponse};
use preflight::validation::{parse_envelope, parse_input};
use preflight::{AnalysisInput, AnalysisResult, AnalysisSummary};

use crate::config::DEEP_REPORT_PATH;
use crate::error::ServerError;
use crate::metrics::ANALYSES;
use crate::state::AppState;

fn run(state: &AppState, input: &AnalysisInput) -> AnalysisResult {
    let result = state.analyzer.analyze(input);
    ANALYSES
        .with_label_values(&[result.verdict.as_str()])
        .inc();
    tracing::info!(
        app = %result.app_name,
        risk_score = result.risk_score,
        verdict = result.verdict.as_str(),
        breakpoints = result.findings.len(),
        "preflight analysis"
    );
    result
}

/// POST /api/preflight-x402 - full result for a bare input body
pub async fn analyze(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError> {
    let input = parse_input(&body)?;
    Ok(HttpResponse::Ok().json(run(&state, &input)))
}

/// POST /entrypoints/preflight-x402/invoke and the paid deep report
pub async fn invoke(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError> {
    let input = parse_envelope(&body)?;
    let result = run(&state, &input);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "output": result })))
}

/// POST /entrypoints/preflight-x402-free/invoke - score, verdict and counts only
pub async fn invoke_summary(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError> {
    let input = parse_envelope(&body)?;
    let summary = AnalysisSummary::from(&run(&state, &input));
    Ok(HttpResponse::Ok().json(serde_json::json!({ "output": summary })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/preflight-x402", web::post().to(analyze))
        .route(DEEP_REPORT_PATH, web::post().to(invoke))
        .route("/entrypoints/preflight-x402/invoke", web::post().to(invoke))
        .route(
            "/entrypoints/preflight-x402-free/invoke",
            web::post().to(invoke_summary),
        );
}
