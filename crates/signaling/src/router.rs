//! Node-Router – Stellt Nachrichten an einen Node zu
//!
//! Loest den Empfaenger ueber die Registry auf und reiht die Nachricht in
//! dessen Send-Queue ein. Der Router aendert weder Registry noch Queue;
//! nicht zustellbare Nachrichten werden protokolliert und verworfen.

use mistnet_core::types::NodeId;
use mistnet_observability::{RelayMetrics, VerwerfungsGrund};

use crate::registry::Registry;

/// Ergebnis einer Zustellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    /// In die Send-Queue des Empfaengers eingereiht
    Zugestellt,
    /// Empfaenger nicht in der Registry
    EmpfaengerUnbekannt,
    /// Schreiben auf die Verbindung des Empfaengers fehlgeschlagen
    TransportFehler,
}

impl Zustellung {
    pub fn ist_zugestellt(&self) -> bool {
        matches!(self, Self::Zugestellt)
    }
}

/// Zustellung von Nachrichten an registrierte Nodes
#[derive(Clone)]
pub struct NodeRouter {
    registry: Registry,
    metriken: RelayMetrics,
}

impl NodeRouter {
    pub fn neu(registry: Registry, metriken: RelayMetrics) -> Self {
        Self { registry, metriken }
    }

    /// Stellt `text` an `empfaenger` zu (ohne Wiederholung, ohne Puffer)
    pub fn deliver(&self, empfaenger: &NodeId, text: String) -> Zustellung {
        tracing::debug!(receiver = %empfaenger, payload = %text, "[SEND]");

        let Some(verbindung) = self.registry.resolve_connection(empfaenger) else {
            tracing::warn!(receiver = %empfaenger, "[ERROR] Empfaenger nicht gefunden");
            self.metriken.verworfen(VerwerfungsGrund::Empfaenger);
            return Zustellung::EmpfaengerUnbekannt;
        };

        match verbindung.senden(text) {
            Ok(()) => {
                self.metriken.payloads_relayed.inc();
                Zustellung::Zugestellt
            }
            Err(e) => {
                tracing::warn!(
                    receiver = %empfaenger,
                    fehler = %e,
                    "[ERROR] Senden fehlgeschlagen"
                );
                self.metriken.verworfen(VerwerfungsGrund::Transport);
                Zustellung::TransportFehler
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use mistnet_core::types::SessionId;

    fn router() -> (NodeRouter, Registry, RelayMetrics) {
        let registry = Registry::neu();
        let metriken = RelayMetrics::neu().unwrap();
        (
            NodeRouter::neu(registry.clone(), metriken.clone()),
            registry,
            metriken,
        )
    }

    #[tokio::test]
    async fn zustellung_an_registrierten_node() {
        let (router, registry, metriken) = router();
        let (h, mut rx) = ConnectionHandle::neu(4);
        registry.upsert(&h, &SessionId::new("s2"), &NodeId::from("n2"));

        let ergebnis = router.deliver(&NodeId::from("n2"), "payload".into());

        assert_eq!(ergebnis, Zustellung::Zugestellt);
        assert_eq!(rx.recv().await.as_deref(), Some("payload"));
        assert_eq!(metriken.payloads_relayed.get(), 1);
    }

    #[test]
    fn unbekannter_empfaenger_wird_verworfen() {
        let (router, _registry, metriken) = router();

        let ergebnis = router.deliver(&NodeId::from("niemand"), "payload".into());

        assert_eq!(ergebnis, Zustellung::EmpfaengerUnbekannt);
        assert_eq!(metriken.verworfen_anzahl(VerwerfungsGrund::Empfaenger), 1);
    }

    #[test]
    fn geschlossene_verbindung_ist_transportfehler() {
        let (router, registry, metriken) = router();
        let (h, rx) = ConnectionHandle::neu(4);
        registry.upsert(&h, &SessionId::new("s2"), &NodeId::from("n2"));
        drop(rx);

        let ergebnis = router.deliver(&NodeId::from("n2"), "payload".into());

        assert_eq!(ergebnis, Zustellung::TransportFehler);
        assert_eq!(metriken.verworfen_anzahl(VerwerfungsGrund::Transport), 1);
        // Router aendert die Registry nicht
        assert!(registry.resolve_connection(&NodeId::from("n2")).is_some());
    }
}
