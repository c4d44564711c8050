//! Fehlertypen fuer den Signaling-Service

use mistnet_core::types::{NodeId, RoomId};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
///
/// Keiner dieser Fehler ist fuer den Prozess fatal. Protokoll- und
/// Routing-Fehler verwerfen die Nachricht, ein Lesefehler beendet nur die
/// betroffene Verbindung.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (Socket, Bind)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Nachricht nicht parsebar
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Nachricht fuer einen anderen Raum
    #[error("Falscher Raum: erwartet '{erwartet}', erhalten '{erhalten}'")]
    FalscherRaum { erwartet: RoomId, erhalten: RoomId },

    /// Empfaenger ist nicht in der Registry
    #[error("Empfaenger nicht registriert: {0}")]
    EmpfaengerUnbekannt(NodeId),

    /// Schreiben auf eine Verbindung fehlgeschlagen
    #[error("Transportfehler: {0}")]
    Transport(String),
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Erstellt einen Transportfehler
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protokoll(e.to_string())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
