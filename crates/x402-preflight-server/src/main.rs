use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::from_fn, middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use preflight_server::{
    config::ServerConfig, cors::build_cors, metrics::register_metrics, payment_gate, routes,
    state::AppState, MAX_BODY_BYTES,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().map_err(|e| {
        tracing::error!("Failed to load configuration: {e}");
        std::io::Error::other(e.to_string())
    })?;
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();

    tracing::info!("Starting x402-preflight on port {}", port);
    tracing::info!("Receivable address: {:#x}", config.wallet_address);
    tracing::info!("Network: {}", config.network);
    tracing::info!("Facilitator URL: {}", config.facilitator_url);
    tracing::info!(
        "HMAC auth: {}",
        if config.hmac_secret.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    tracing::info!("Malformed JSON-RPC policy: {:?}", config.malformed_rpc_policy);

    let state = AppState::from_config(&config).map_err(|e| {
        tracing::error!("Failed to initialize service: {e}");
        std::io::Error::other(e.to_string())
    })?;
    for route in state.gate.routes() {
        tracing::info!(
            "Priced route: {} {} at {}",
            route.method,
            route.path,
            route.requirements.price
        );
    }
    let state_data = web::Data::new(state);

    register_metrics();

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm as u64)
        .finish()
        .ok_or_else(|| std::io::Error::other("invalid rate limiter configuration"))?;

    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            .wrap(from_fn(payment_gate))
            .wrap(Logger::default())
            .wrap(build_cors(&allowed_origins))
            .wrap(Governor::new(&governor_conf))
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
