//! HTTP endpoints for postbox-relay.
//!
//! Provides health checks and Prometheus metrics.

pub mod health;
mod metrics;

use crate::server::PostboxRelay;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
///
/// `/metrics` is only routed when `http.metrics_enabled` is set.
pub fn build_router(relay: Arc<PostboxRelay>) -> Router {
    let mut router = Router::new().route("/health", get(health::health_handler));
    if relay.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }
    router.layer(Extension(relay))
}
