//! mistnet-relay – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use mistnet_observability::{observability_router, RelayMetrics};
use mistnet_signaling::{RelayState, SignalingServer};
use std::net::SocketAddr;
use std::sync::Arc;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet das Relay und laeuft bis zum Shutdown-Signal (Ctrl-C)
    ///
    /// Ist `global_node.enable` deaktiviert, kehrt die Methode sofort zurueck.
    /// Ein Fehler beim Binden des Ports ist fatal.
    pub async fn starten(self) -> Result<()> {
        if !self.config.global_node.enable {
            tracing::info!("Relay deaktiviert (global_node.enable = false)");
            return Ok(());
        }

        let bind_addr: SocketAddr = self
            .config
            .bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.bind_adresse()))?;

        let metriken = RelayMetrics::neu()?;
        let state = RelayState::neu(self.config.relay_config(), metriken.clone());

        let mut server = SignalingServer::neu(Arc::clone(&state), bind_addr);
        if self.config.observability.aktiviert {
            server = server.mit_router(observability_router(metriken, state.start_time));
        }

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Relay wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Signal-Handler fehlgeschlagen"),
            }
            let _ = shutdown_tx.send(true);
        });

        server
            .starten(shutdown_rx)
            .await
            .with_context(|| format!("Relay konnte nicht auf {bind_addr} starten"))?;

        tracing::info!(uptime_sek = state.uptime_sek(), "Relay beendet");
        Ok(())
    }
}
