//! Health-Check-Endpunkt fuer das Relay
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, registrierten Nodes und Queue-Laenge

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::metrics::RelayMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub registered_nodes: i64,
    pub queue_length: i64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// `start_time` ist der Startzeitpunkt des Relays, nicht des Routers.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    pub metriken: RelayMetrics,
}

impl HealthState {
    pub fn neu(metriken: RelayMetrics, start_time: Instant) -> Self {
        Self {
            start_time,
            metriken,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn antwort(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            registered_nodes: self.metriken.registered_nodes.get(),
            queue_length: self.metriken.queue_length.get(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Relay-Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.antwort()))
}
