use actix_web::{web, HttpRequest, HttpResponse};

use crate::metrics::metrics_output;
use crate::security::bearer_matches;
use crate::state::AppState;

/// GET /health - Health check endpoint
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "x402-preflight",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics - Prometheus metrics endpoint (optionally auth-gated)
pub async fn metrics(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(ref expected_token) = state.metrics_token {
        let header = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        if !bearer_matches(header, expected_token) {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "Valid Bearer token required for /metrics"
            }));
        }
    }

    match metrics_output() {
        Ok(output) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(output),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().body("Failed to encode metrics")
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics));
}
