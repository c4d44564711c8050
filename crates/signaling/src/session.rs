//! Session-Handler – Kontrollschleife einer einzelnen Verbindung
//!
//! Jede Verbindung bekommt einen eigenen `SessionHandler` in einem eigenen
//! tokio-Task. Eingehende Nachrichten werden nacheinander verarbeitet,
//! dadurch bleibt die Reihenfolge pro Sender erhalten.
//!
//! ## State Machine
//! ```text
//! Offen --(erste gueltige Nachricht)--> Aktiv --(Lesefehler / Ende)--> Geschlossen
//! ```
//!
//! Fehler einzelner Nachrichten (ungueltiges JSON, fremder Raum, unbekannter
//! Empfaenger) beenden die Verbindung nicht.

use futures_util::{Stream, StreamExt};
use mistnet_core::types::{NodeId, SessionId};
use mistnet_observability::VerwerfungsGrund;
use mistnet_protocol::SignalingPayload;
use std::sync::Arc;

use crate::connection::ConnectionHandle;
use crate::error::{SignalingError, SignalingResult};
use crate::pairing::{Paarung, PaarungsZustellung};
use crate::router::Zustellung;
use crate::server_state::RelayState;

/// Zustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    /// Verbunden, noch keine gueltige Nachricht
    Offen,
    /// Mindestens eine gueltige Nachricht empfangen
    Aktiv,
    /// Verbindung beendet, Registry bereinigt
    Geschlossen,
}

/// Ergebnis der Verarbeitung einer gueltigen Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verarbeitung {
    /// Nachricht an den Empfaenger weitergeleitet
    Weitergeleitet {
        empfaenger: NodeId,
        zustellung: Zustellung,
    },
    /// Request in die Pairing-Queue eingereiht
    Eingereiht {
        laenge: usize,
        paarung: Option<(Paarung, PaarungsZustellung)>,
    },
}

/// Verarbeitet die Nachrichten einer einzelnen Verbindung
pub struct SessionHandler {
    state: Arc<RelayState>,
    session: SessionId,
    zustand: SessionZustand,
}

impl SessionHandler {
    /// Erstellt einen neuen SessionHandler
    pub fn neu(state: Arc<RelayState>, session: SessionId) -> Self {
        Self {
            state,
            session,
            zustand: SessionZustand::Offen,
        }
    }

    pub fn zustand(&self) -> SessionZustand {
        self.zustand
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis der Eingangs-Stream endet oder einen Lesefehler liefert,
    /// danach wird die Registry bereinigt.
    pub async fn verarbeiten<S, E>(mut self, mut eingang: S, verbindung: ConnectionHandle)
    where
        S: Stream<Item = Result<String, E>> + Unpin,
        E: std::fmt::Display,
    {
        tracing::info!(session = %self.session, "[OPEN]");

        while let Some(frame) = eingang.next().await {
            match frame {
                Ok(text) => {
                    if let Err(e) = self.nachricht_verarbeiten(&verbindung, &text) {
                        tracing::debug!(
                            session = %self.session,
                            fehler = %e,
                            "Nachricht verworfen"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %self.session, fehler = %e, "Lesefehler");
                    break;
                }
            }
        }

        self.schliessen();
    }

    /// Verarbeitet eine einzelne eingehende Nachricht
    pub fn nachricht_verarbeiten(
        &mut self,
        verbindung: &ConnectionHandle,
        text: &str,
    ) -> SignalingResult<Verarbeitung> {
        if self.zustand == SessionZustand::Geschlossen {
            return Err(SignalingError::transport("Session bereits geschlossen"));
        }

        let metriken = &self.state.metriken;
        metriken.payloads_received.inc();
        tracing::debug!(session = %self.session, payload = %text, "[RECV]");

        let payload = match SignalingPayload::from_json(text) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(session = %self.session, fehler = %e, "[ERROR] Ungueltiges JSON");
                metriken.verworfen(VerwerfungsGrund::Protokoll);
                return Err(e.into());
            }
        };

        let raum = &self.state.config.room_id;
        if &payload.room_id != raum {
            metriken.verworfen(VerwerfungsGrund::Raum);
            return Err(SignalingError::FalscherRaum {
                erwartet: raum.clone(),
                erhalten: payload.room_id,
            });
        }

        self.zustand = SessionZustand::Aktiv;
        let ausgetragen = self
            .state
            .registry
            .upsert(verbindung, &self.session, &payload.sender_id);
        // Ausgetragene Identitaeten duerfen nicht als Kopf in der Queue bleiben
        for alt in &ausgetragen {
            let entfernt = self.state.queue.entfernen(alt);
            if entfernt > 0 {
                tracing::debug!(
                    session = %self.session,
                    node = %alt,
                    queue_eintraege = entfernt,
                    "Alte Identitaet aus der Queue entfernt"
                );
            }
        }

        let ergebnis = if payload.typ.ist_request() {
            let laenge = self
                .state
                .queue
                .enqueue(payload.sender_id.clone(), payload);
            let paarung = if laenge >= 2 {
                let paarung = self.state.queue.abgleichen(&self.state.router);
                if paarung.is_some() {
                    metriken.pairings.inc();
                }
                paarung
            } else {
                None
            };
            Verarbeitung::Eingereiht { laenge, paarung }
        } else {
            let empfaenger = payload.receiver_id;
            // Unveraenderter Originaltext, der Inhalt wird nicht interpretiert
            let zustellung = self.state.router.deliver(&empfaenger, text.to_string());
            Verarbeitung::Weitergeleitet {
                empfaenger,
                zustellung,
            }
        };

        self.state.gauges_aktualisieren();
        Ok(ergebnis)
    }

    /// Beendet die Session und bereinigt Registry und Pairing-Queue
    ///
    /// Gibt den ausgetragenen Node zurueck. Mehrfaches Aufrufen ist harmlos.
    pub fn schliessen(&mut self) -> Option<NodeId> {
        if self.zustand == SessionZustand::Geschlossen {
            return None;
        }
        self.zustand = SessionZustand::Geschlossen;
        tracing::info!(session = %self.session, "[CLOSE]");

        let node = self.state.registry.remove(&self.session)?;
        let entfernt = self.state.queue.entfernen(&node);
        tracing::debug!(
            session = %self.session,
            node = %node,
            queue_eintraege = entfernt,
            "Node ausgetragen"
        );
        self.state.gauges_aktualisieren();
        Some(node)
    }
}
