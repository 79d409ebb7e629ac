use actix_cors::Cors;
use actix_web::http::header;
use preflight::constants::{
    PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER,
};

/// Build the CORS middleware. A `*` entry admits any origin.
///
/// Payment headers are allowed inbound and the receipt header is exposed so
/// browser clients can read it.
pub fn build_cors(allowed_origins: &[String]) -> Cors {
    let allowed = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            let origin_str = origin.to_str().unwrap_or("");
            allowed.iter().any(|a| a == "*" || a == origin_str)
        })
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .allowed_headers([
            PAYMENT_HEADER,
            PAYMENT_SIGNATURE_HEADER,
            PAYMENT_RESPONSE_HEADER,
        ])
        .expose_headers([PAYMENT_RESPONSE_HEADER])
        .max_age(3600)
}
