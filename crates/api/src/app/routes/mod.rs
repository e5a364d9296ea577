use axum::{Router, routing::get};

pub mod brands;
pub mod common;
pub mod items;
pub mod promoters;
pub mod stock;
pub mod system;
pub mod transactions;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/brands", brands::router())
        .nest("/items", items::router())
        .nest("/stock", stock::router())
        .nest("/promoters", promoters::router())
        .nest("/transactions", transactions::router())
}
