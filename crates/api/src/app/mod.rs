//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger backend, event bus, registry board, realtime feed
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON ingress checks
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use partyplan_infra::RegistryConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Fails only when the configured storage backend cannot be reached or migrated.
pub async fn build_app(config: &RegistryConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services))))
}
