//! Gemeinsamer Relay-Zustand
//!
//! Haelt Konfiguration, Registry, Pairing-Queue und Router. Wird als
//! `Arc<RelayState>` an jeden Verbindungs-Task weitergegeben; es gibt
//! keinen prozessweiten Singleton.

use mistnet_core::types::RoomId;
use mistnet_observability::RelayMetrics;
use std::sync::Arc;
use std::time::Instant;

use crate::connection::SEND_QUEUE_GROESSE;
use crate::pairing::PairingQueue;
use crate::registry::Registry;
use crate::router::NodeRouter;

/// Konfiguration fuer den Signaling-Service (unveraenderlich nach dem Start)
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Der einzige Raum, den dieses Relay bedient
    pub room_id: RoomId,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            room_id: RoomId::from("MistNet"),
            send_queue_groesse: SEND_QUEUE_GROESSE,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Node <-> Verbindung <-> Session
    pub registry: Registry,
    /// Wartende Verbindungswuensche
    pub queue: PairingQueue,
    /// Zustellung an registrierte Nodes
    pub router: NodeRouter,
    /// Prometheus-Metriken
    pub metriken: RelayMetrics,
    /// Startzeitpunkt des Relays
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig, metriken: RelayMetrics) -> Arc<Self> {
        let registry = Registry::neu();
        Arc::new(Self {
            config: Arc::new(config),
            router: NodeRouter::neu(registry.clone(), metriken.clone()),
            registry,
            queue: PairingQueue::neu(),
            metriken,
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Aktualisiert die Gauges fuer Registry und Queue
    pub(crate) fn gauges_aktualisieren(&self) {
        self.metriken
            .registered_nodes
            .set(self.registry.anzahl() as i64);
        self.metriken.queue_length.set(self.queue.laenge() as i64);
    }
}
