//! Built-in liveness port used by the shipped binary.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::http::RequestLogger;
use crate::ports::BusinessPort;

/// Serves `GET /health`.
#[derive(Debug, Clone, Default)]
pub struct HealthPort;

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
}

async fn health_check_handler(logger: RequestLogger) -> Json<HealthStatus> {
    logger.in_scope(|| tracing::debug!("Health check"));
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

impl BusinessPort for HealthPort {
    fn routes(self: Arc<Self>) -> Router {
        Router::new().route("/health", get(health_check_handler))
    }
}
