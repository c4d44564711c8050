//! MistNet Relay – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet das Relay.

use anyhow::Result;
use mistnet_relay::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("MIST_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = ServerConfig::laden(&config_pfad)?;

    mistnet_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        raum = %config.signaling.room_id,
        "MistNet Relay wird initialisiert"
    );

    Server::neu(config).starten().await
}
