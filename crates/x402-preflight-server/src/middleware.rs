//! Payment middleware: runs the gate ahead of every handler.
//!
//! For the JSON-RPC path the body is read once, handed to the gate, and put
//! back on the request so the handler reads the same bytes.

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage};
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use preflight::constants::{
    PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER,
};
use preflight::{BypassReason, GateOutcome, InboundRequest, PaymentReceipt};

use crate::error::ServerError;
use crate::metrics::{GATE_DECISIONS, REQUESTS, VERIFICATIONS};
use crate::state::AppState;

/// Upper bound on any request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Proof header value, `X-PAYMENT` first, `PAYMENT-SIGNATURE` as fallback.
pub fn extract_proof(headers: &HeaderMap) -> Option<String> {
    [PAYMENT_HEADER, PAYMENT_SIGNATURE_HEADER]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
}

/// Base64 JSON receipt for the `X-PAYMENT-RESPONSE` header.
pub fn encode_receipt(receipt: &PaymentReceipt) -> Option<HeaderValue> {
    let json = serde_json::to_vec(receipt).ok()?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(json);
    HeaderValue::from_str(&encoded).ok()
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn read_body(mut payload: Payload, limit: usize) -> Result<Bytes, Error> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(ServerError::PayloadTooLarge(limit).into());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

fn replay(body: Bytes) -> Payload {
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(body);
    payload.into()
}

fn record_request(res: &ServiceResponse<BoxBody>, fallback: Option<&str>) {
    // Matched pattern or the configured priced path, never the raw path.
    let endpoint = res
        .request()
        .match_pattern()
        .or_else(|| fallback.map(String::from))
        .unwrap_or_else(|| "unmatched".to_string());
    REQUESTS
        .with_label_values(&[endpoint.as_str(), res.status().as_str()])
        .inc();
}

pub async fn payment_gate(
    mut req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return Ok(next.call(req).await?.map_into_boxed_body());
    };

    if declared_length(req.headers()).is_some_and(|len| len > MAX_BODY_BYTES) {
        let res = req.error_response(ServerError::PayloadTooLarge(MAX_BODY_BYTES));
        record_request(&res, None);
        return Ok(res);
    }

    let method = req.method().as_str().to_owned();
    // The router matches on the percent-decoded path; price it the same way.
    let path = req.match_info().as_str().to_owned();
    let priced_path = state.gate.get_route(&method, &path).map(|r| r.path.clone());

    let body = if state.gate.needs_body(&method, &path) {
        match read_body(req.take_payload(), MAX_BODY_BYTES).await {
            Ok(bytes) => {
                req.set_payload(replay(bytes.clone()));
                Some(bytes)
            }
            Err(e) => {
                let res = req.error_response(e);
                record_request(&res, priced_path.as_deref());
                return Ok(res);
            }
        }
    } else {
        None
    };

    let proof = extract_proof(req.headers());
    let outcome = state
        .gate
        .evaluate(
            &InboundRequest {
                method: &method,
                path: &path,
                body: body.as_deref(),
                proof: proof.as_deref(),
            },
            state.verifier.as_ref(),
        )
        .await;

    let res = match outcome {
        GateOutcome::Proceed(reason) => {
            match reason {
                BypassReason::NotPriced => {}
                BypassReason::MethodNotChargeable(_) => {
                    GATE_DECISIONS.with_label_values(&["bypassed"]).inc();
                }
                BypassReason::MalformedRpcBody => {
                    GATE_DECISIONS.with_label_values(&["fail_open"]).inc();
                }
            }
            next.call(req).await?.map_into_boxed_body()
        }
        GateOutcome::Verified(receipt) => {
            GATE_DECISIONS.with_label_values(&["enforced"]).inc();
            VERIFICATIONS.with_label_values(&["valid"]).inc();
            let mut res = next.call(req).await?.map_into_boxed_body();
            if let (Some(value), Ok(name)) = (
                encode_receipt(&receipt),
                HeaderName::from_bytes(PAYMENT_RESPONSE_HEADER.as_bytes()),
            ) {
                res.headers_mut().insert(name, value);
            }
            res
        }
        GateOutcome::PaymentRequired(body) => {
            GATE_DECISIONS.with_label_values(&["enforced"]).inc();
            if proof.is_some() {
                VERIFICATIONS.with_label_values(&["invalid"]).inc();
            }
            req.error_response(ServerError::PaymentRequired(body))
        }
        GateOutcome::Unavailable(reason) => {
            GATE_DECISIONS.with_label_values(&["enforced"]).inc();
            VERIFICATIONS.with_label_values(&["unavailable"]).inc();
            req.error_response(ServerError::UpstreamUnavailable(reason))
        }
    };

    record_request(&res, priced_path.as_deref());
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_proof_header_precedence() {
        let req = TestRequest::default()
            .insert_header(("X-PAYMENT", "primary"))
            .insert_header(("PAYMENT-SIGNATURE", "fallback"))
            .to_http_request();
        assert_eq!(extract_proof(req.headers()).as_deref(), Some("primary"));

        let req = TestRequest::default()
            .insert_header(("PAYMENT-SIGNATURE", "fallback"))
            .to_http_request();
        assert_eq!(extract_proof(req.headers()).as_deref(), Some("fallback"));

        let req = TestRequest::default()
            .insert_header(("X-PAYMENT", "  "))
            .to_http_request();
        assert_eq!(extract_proof(req.headers()), None);
    }

    #[test]
    fn test_receipt_header_decodes() {
        let receipt = PaymentReceipt {
            success: true,
            payer: Some("0xabc".to_string()),
            network: "eip155:84532".to_string(),
        };
        let value = encode_receipt(&receipt).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value.to_str().unwrap())
            .unwrap();
        let back: PaymentReceipt = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(back, receipt);
    }
}
