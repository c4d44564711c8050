//! Verbindungs-Handle – Schreibpfad zu einer einzelnen Verbindung
//!
//! Jede Verbindung hat eine eigene Send-Queue. Ein Schreib-Task pro
//! Verbindung leert die Queue in den Transport, sodass eine blockierte
//! Verbindung keine anderen Verbindungen aufhaelt.

use mistnet_core::types::ConnectionId;
use tokio::sync::mpsc;

use crate::error::{SignalingError, SignalingResult};

/// Standardgroesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Handle auf die Send-Queue einer Verbindung
///
/// Clone ist billig und teilt dieselbe Queue.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Erstellt ein neues Handle samt Empfangsseite fuer den Schreib-Task
    pub fn neu(kapazitaet: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(kapazitaet.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Reiht eine Textnachricht nicht-blockierend ein
    pub fn senden(&self, text: String) -> SignalingResult<()> {
        match self.tx.try_send(text) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(SignalingError::transport("Send-Queue voll"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(SignalingError::transport("Verbindung geschlossen"))
            }
        }
    }

    /// Prueft ob der Schreib-Task beendet ist
    pub fn ist_geschlossen(&self) -> bool {
        self.tx.is_closed()
    }
}
