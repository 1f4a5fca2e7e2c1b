pub mod config;
pub mod error;
pub mod modules;
pub mod response;
pub mod services;

use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use config::DbPool;
use modules::auth::auth_routes;
use modules::profile::profile_routes;
use services::jwt::JwtService;
use services::mailer::Mailer;
use services::rate_limit::{create_rate_limiter, RateLimitLayer};
use services::security::security_headers;

pub struct AppState {
    pub db: DbPool,
    pub jwt_service: JwtService,
    pub mailer: Arc<dyn Mailer>,
    pub totp_issuer: String,
}

pub async fn create_app(
    db: DbPool,
    jwt_service: JwtService,
    mailer: Arc<dyn Mailer>,
    totp_issuer: String,
) -> Router {
    let state = Arc::new(AppState {
        db,
        jwt_service,
        mailer,
        totp_issuer,
    });

    // Generous global limiter; argon2 cost is the real throttle on login
    let rate_limiter = create_rate_limiter(50, 100);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/users", profile_routes(state.clone()))
        .layer(middleware::from_fn(security_headers))
        .layer(RequestBodyLimitLayer::new(1024 * 100)) // 100KB max body
        .layer(RateLimitLayer::new(rate_limiter))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "DebtRescue.AI API"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
