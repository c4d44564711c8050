//! Prometheus-kompatible Metriken fuer das Signaling-Relay
//!
//! Registrierte Metriken:
//! - `mistnet_payloads_received_total` – Counter: Eingegangene Nachrichten
//! - `mistnet_payloads_relayed_total` – Counter: Zugestellte Nachrichten
//! - `mistnet_payloads_dropped_total` – Counter: Verworfene Nachrichten (grund)
//! - `mistnet_pairings_total` – Counter: Durchgefuehrte Paarungen
//! - `mistnet_registered_nodes` – Gauge: Nodes in der Registry
//! - `mistnet_pairing_queue_length` – Gauge: Laenge der Pairing-Queue
//! - `mistnet_open_connections` – Gauge: Offene WebSocket-Verbindungen

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Grund fuer das Verwerfen einer Nachricht (Label `grund`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerwerfungsGrund {
    /// Nachricht nicht parsebar
    Protokoll,
    /// Nachricht fuer einen fremden Raum
    Raum,
    /// Empfaenger nicht registriert
    Empfaenger,
    /// Schreiben auf die Zielverbindung fehlgeschlagen
    Transport,
}

impl VerwerfungsGrund {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Protokoll => "protokoll",
            Self::Raum => "raum",
            Self::Empfaenger => "empfaenger",
            Self::Transport => "transport",
        }
    }
}

/// Alle Relay-Metriken einer Instanz
///
/// Jede Instanz hat ihre eigene Registry, damit Tests sich nicht beeinflussen.
#[derive(Clone)]
pub struct RelayMetrics {
    pub registry: Arc<Registry>,

    pub payloads_received: IntCounter,
    pub payloads_relayed: IntCounter,
    pub payloads_dropped: IntCounterVec,
    pub pairings: IntCounter,

    pub registered_nodes: IntGauge,
    pub queue_length: IntGauge,
    pub open_connections: IntGauge,
}

impl RelayMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let payloads_received = IntCounter::with_opts(Opts::new(
            "mistnet_payloads_received_total",
            "Gesamtanzahl empfangener Signaling-Nachrichten",
        ))?;
        registry.register(Box::new(payloads_received.clone()))?;

        let payloads_relayed = IntCounter::with_opts(Opts::new(
            "mistnet_payloads_relayed_total",
            "Gesamtanzahl zugestellter Signaling-Nachrichten",
        ))?;
        registry.register(Box::new(payloads_relayed.clone()))?;

        let payloads_dropped = IntCounterVec::new(
            Opts::new(
                "mistnet_payloads_dropped_total",
                "Gesamtanzahl verworfener Signaling-Nachrichten",
            ),
            &["grund"],
        )?;
        registry.register(Box::new(payloads_dropped.clone()))?;

        let pairings = IntCounter::with_opts(Opts::new(
            "mistnet_pairings_total",
            "Gesamtanzahl durchgefuehrter Paarungen",
        ))?;
        registry.register(Box::new(pairings.clone()))?;

        let registered_nodes = IntGauge::with_opts(Opts::new(
            "mistnet_registered_nodes",
            "Anzahl aktuell registrierter Nodes",
        ))?;
        registry.register(Box::new(registered_nodes.clone()))?;

        let queue_length = IntGauge::with_opts(Opts::new(
            "mistnet_pairing_queue_length",
            "Anzahl wartender Eintraege in der Pairing-Queue",
        ))?;
        registry.register(Box::new(queue_length.clone()))?;

        let open_connections = IntGauge::with_opts(Opts::new(
            "mistnet_open_connections",
            "Anzahl offener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(open_connections.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            payloads_received,
            payloads_relayed,
            payloads_dropped,
            pairings,
            registered_nodes,
            queue_length,
            open_connections,
        })
    }

    /// Zaehlt eine verworfene Nachricht
    pub fn verworfen(&self, grund: VerwerfungsGrund) {
        self.payloads_dropped
            .with_label_values(&[grund.label()])
            .inc();
    }

    /// Liest den Zaehlerstand fuer einen Verwerfungsgrund
    pub fn verworfen_anzahl(&self, grund: VerwerfungsGrund) -> u64 {
        self.payloads_dropped
            .with_label_values(&[grund.label()])
            .get()
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
