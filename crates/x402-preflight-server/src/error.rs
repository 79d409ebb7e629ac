use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use preflight::{PaymentRequiredBody, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Body could not be analyzed
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Proof missing or rejected
    #[error("payment required")]
    PaymentRequired(PaymentRequiredBody),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Verifier or facilitator could not reach a verdict
    #[error("payment verification unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServerError::Validation(details) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Invalid request body",
                    "details": details,
                }))
            }
            ServerError::PaymentRequired(body) => HttpResponse::PaymentRequired().json(body),
            ServerError::PayloadTooLarge(limit) => {
                HttpResponse::PayloadTooLarge().json(serde_json::json!({
                    "error": "payload_too_large",
                    "message": format!("Request body must not exceed {limit} bytes")
                }))
            }
            ServerError::UpstreamUnavailable(msg) => {
                tracing::error!("Payment verification unavailable: {}", msg);
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "payment_verification_unavailable",
                    "message": "Payment could not be verified right now, retry later"
                }))
            }
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "An internal error occurred"
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(err: ServerError) -> (StatusCode, serde_json::Value) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_rt::test]
    async fn test_validation_breakdown_shape() {
        let err = preflight::validation::parse_input(br#"{"routes":[]}"#).unwrap_err();
        let (status, body) = body_json(ServerError::Validation(err)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
        assert!(body["details"]["formErrors"].is_array());
        assert!(body["details"]["fieldErrors"]["routes"].is_array());
    }

    #[actix_rt::test]
    async fn test_internal_message_is_generic() {
        let (status, body) = body_json(ServerError::Internal("db password wrong".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_upstream_is_not_payment_required() {
        assert_eq!(
            ServerError::UpstreamUnavailable("timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
