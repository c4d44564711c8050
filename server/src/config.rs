//! Relay-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte. Existiert die Datei nicht, wird sie mit den
//! Standardwerten angelegt.

use anyhow::bail;
use mistnet_core::types::RoomId;
use mistnet_observability::logging::{log_format_gueltig, log_level_gueltig};
use mistnet_signaling::RelayConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Vollstaendige Relay-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Raum und Queue-Einstellungen
    pub signaling: SignalingEinstellungen,
    /// Listener-Einstellungen
    pub global_node: GlobalNodeEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Signaling-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Der einzige Raum, den dieses Relay bedient
    pub room_id: String,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        Self {
            room_id: "MistNet".into(),
            send_queue_groesse: 64,
        }
    }
}

/// Listener-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalNodeEinstellungen {
    /// Relay aktiv (false = Prozess beendet sich ohne zu binden)
    pub enable: bool,
    /// Bind-Adresse
    pub bind_adresse: String,
    /// Port fuer WebSocket, Health und Metriken
    pub port: u16,
}

impl Default for GlobalNodeEinstellungen {
    fn default() -> Self {
        Self {
            enable: true,
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// `/health` und `/metrics` auf dem Relay-Port bereitstellen
    pub aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { aktiviert: true }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Legt die Datei mit Standardwerten an, wenn sie nicht existiert.
    pub fn laden(pfad: impl AsRef<Path>) -> anyhow::Result<Self> {
        let pfad = pfad.as_ref();
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                config.validieren().map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.speichern(pfad)?;
                tracing::warn!(
                    pfad = %pfad.display(),
                    "Konfigurationsdatei nicht gefunden, Standardwerte angelegt"
                );
                Ok(config)
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Prueft Werte, die TOML allein nicht einschraenkt
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            bail!(
                "logging.level '{}' ungueltig (trace, debug, info, warn, error)",
                self.logging.level
            );
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!("logging.format '{}' ungueltig (text, json)", self.logging.format);
        }
        if self.signaling.send_queue_groesse == 0 {
            bail!("signaling.send_queue_groesse muss groesser als 0 sein");
        }
        Ok(())
    }

    /// Schreibt die Konfiguration als TOML
    pub fn speichern(&self, pfad: impl AsRef<Path>) -> anyhow::Result<()> {
        let pfad = pfad.as_ref();
        let inhalt = toml::to_string_pretty(self)?;
        std::fs::write(pfad, inhalt).map_err(|e| {
            anyhow::anyhow!("Konfigurationsdatei '{}' nicht schreibbar: {e}", pfad.display())
        })?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.global_node.bind_adresse, self.global_node.port)
    }

    /// Konfiguration fuer den Signaling-Service
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            room_id: RoomId::new(self.signaling.room_id.clone()),
            send_queue_groesse: self.signaling.send_queue_groesse,
        }
    }
}
