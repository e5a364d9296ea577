//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: store, bus, read models, projection worker, SSE fan-out
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: request bodies and JSON mapping
//! - `errors.rs`: `{error, message}` responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use promostock_auth::Hs256JwtValidator;
use promostock_infra::AppConfig;
use secrecy::ExposeSecret;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Router over in-memory stores, as used by the black-box tests.
pub async fn build_app(jwt_secret: impl AsRef<[u8]>) -> Result<Router, services::StartupError> {
    let services = Arc::new(services::build_in_memory_services().await?);
    Ok(build_router(services, jwt_secret))
}

/// Router and services as configured for the running binary. The caller
/// owns shutdown of the returned services.
pub async fn build_app_from_config(
    config: &AppConfig,
) -> Result<(Router, Arc<AppServices>), services::StartupError> {
    let services = Arc::new(services::build_services(config).await?);
    let router = build_router(services.clone(), config.jwt_secret.expose_secret().as_bytes());
    Ok((router, services))
}

/// Full router around already wired services.
pub fn build_router(services: Arc<AppServices>, jwt_secret: impl AsRef<[u8]>) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(jwt_secret));
    let auth_state = middleware::AuthState { jwt };

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
