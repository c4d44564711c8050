//! # mistnet-observability
//!
//! Observability-Crate fuer das Signaling-Relay:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber
//! - Request-Tracing fuer den HTTP-Router

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, RelayMetrics, VerwerfungsGrund};

use std::time::Instant;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;

/// Tracing-Layer fuer alle HTTP-Anfragen (inklusive WebSocket-Upgrade)
pub fn request_trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// Router mit `/metrics` und `/health`
///
/// `start_time` ist der Startzeitpunkt des Relays, damit `/health` dieselbe
/// Uptime meldet wie das Relay selbst.
pub fn observability_router(metriken: RelayMetrics, start_time: Instant) -> axum::Router {
    let health = HealthState::neu(metriken.clone(), start_time);
    axum::Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(health))
}
