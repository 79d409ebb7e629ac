pub mod a2a;
pub mod health;
pub mod preflight;

use actix_web::web;

/// Mount every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure)
        .configure(preflight::configure)
        .configure(a2a::configure);
}
