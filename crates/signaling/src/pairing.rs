//! Pairing-Queue – Rendezvous wartender Nodes
//!
//! Nodes, die einen `Request` senden, reihen sich in eine FIFO-Queue ein.
//! Sobald zwei Eintraege warten, werden die beiden aeltesten gepaart:
//!
//! ```text
//! Queue: [head, second, ...]
//!   -> an head:   Request  Sender=second  Receiver=head   Room=second.room
//!   -> an second: Request  Data="Disconnect"  Sender=head  Receiver=second  Room=head.room
//! Queue: [..., head]
//! ```
//!
//! `head` kehrt an das Ende der Queue zurueck und steht weiteren
//! Neuankoemmlingen zur Verfuegung, `second` wird verbraucht. Die
//! Nachrichten werden unter der Sperre erzeugt und ausserhalb zugestellt,
//! immer zuerst an `head`, dann an `second`.

use mistnet_core::types::NodeId;
use mistnet_protocol::SignalingPayload;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::router::{NodeRouter, Zustellung};

/// Ein wartender Verbindungswunsch
#[derive(Debug, Clone)]
pub struct AusstehendeAnfrage {
    pub node: NodeId,
    /// Zuletzt empfangene Request-Nachricht des Nodes
    pub payload: SignalingPayload,
}

/// Ergebnis eines Abgleichs: die beiden erzeugten Nachrichten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paarung {
    pub head: NodeId,
    pub second: NodeId,
    pub an_head: SignalingPayload,
    pub an_second: SignalingPayload,
}

/// Zustellergebnisse einer Paarung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaarungsZustellung {
    pub head: Zustellung,
    pub second: Zustellung,
}

/// FIFO-Queue der wartenden Nodes
///
/// Duplikate sind erlaubt. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct PairingQueue {
    inner: Arc<Mutex<VecDeque<AusstehendeAnfrage>>>,
}

impl PairingQueue {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt einen Eintrag an und gibt die neue Laenge zurueck
    pub fn enqueue(&self, node: NodeId, payload: SignalingPayload) -> usize {
        let mut queue = self.inner.lock();
        queue.push_back(AusstehendeAnfrage { node, payload });
        queue.len()
    }

    /// Paart die beiden aeltesten Eintraege
    ///
    /// Gibt `None` zurueck, wenn inzwischen weniger als zwei Eintraege
    /// warten (ein anderer Abgleich war schneller).
    pub fn try_match(&self) -> Option<Paarung> {
        let mut queue = self.inner.lock();
        if queue.len() < 2 {
            return None;
        }

        let head = queue.pop_front()?;
        let second = queue.pop_front()?;

        let an_head = SignalingPayload::verbindungs_anfrage(
            second.node.clone(),
            head.node.clone(),
            second.payload.room_id.clone(),
        );
        let an_second = SignalingPayload::trenn_anfrage(
            head.node.clone(),
            second.node.clone(),
            head.payload.room_id.clone(),
        );

        let paarung = Paarung {
            head: head.node.clone(),
            second: second.node,
            an_head,
            an_second,
        };

        // head steht weiteren Nodes zur Verfuegung
        queue.push_back(head);

        Some(paarung)
    }

    /// Fuehrt einen Abgleich durch und stellt beide Nachrichten zu
    ///
    /// Zustellfehler machen die Paarung nicht rueckgaengig.
    pub fn abgleichen(&self, router: &NodeRouter) -> Option<(Paarung, PaarungsZustellung)> {
        let paarung = self.try_match()?;

        tracing::info!(head = %paarung.head, second = %paarung.second, "Nodes gepaart");

        let zustellung = PaarungsZustellung {
            head: nachricht_zustellen(router, &paarung.head, &paarung.an_head),
            second: nachricht_zustellen(router, &paarung.second, &paarung.an_second),
        };
        Some((paarung, zustellung))
    }

    /// Entfernt alle wartenden Eintraege eines Nodes
    ///
    /// Gibt die Anzahl entfernter Eintraege zurueck.
    pub fn entfernen(&self, node: &NodeId) -> usize {
        let mut queue = self.inner.lock();
        let vorher = queue.len();
        queue.retain(|anfrage| &anfrage.node != node);
        vorher - queue.len()
    }

    pub fn laenge(&self) -> usize {
        self.inner.lock().len()
    }

    /// Aktuelle Reihenfolge der wartenden Nodes (Kopf zuerst)
    pub fn snapshot(&self) -> Vec<NodeId> {
        self.inner
            .lock()
            .iter()
            .map(|anfrage| anfrage.node.clone())
            .collect()
    }
}

fn nachricht_zustellen(
    router: &NodeRouter,
    empfaenger: &NodeId,
    payload: &SignalingPayload,
) -> Zustellung {
    match payload.to_json() {
        Ok(text) => router.deliver(empfaenger, text),
        Err(e) => {
            tracing::error!(
                receiver = %empfaenger,
                fehler = %e,
                "Pairing-Nachricht nicht serialisierbar"
            );
            Zustellung::TransportFehler
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::registry::Registry;
    use mistnet_core::types::SessionId;
    use mistnet_observability::RelayMetrics;
    use mistnet_protocol::DISCONNECT_DATA;

    fn request(node: &str, room: &str) -> SignalingPayload {
        SignalingPayload::from_json(&format!(
            r#"{{"Type":"Request","SenderId":"{node}","ReceiverId":"","RoomId":"{room}"}}"#
        ))
        .unwrap()
    }

    fn einreihen(queue: &PairingQueue, node: &str) -> usize {
        queue.enqueue(NodeId::from(node), request(node, "MistNet"))
    }

    #[test]
    fn enqueue_gibt_laenge_zurueck() {
        let queue = PairingQueue::neu();
        assert_eq!(einreihen(&queue, "a"), 1);
        assert_eq!(einreihen(&queue, "b"), 2);
        assert_eq!(queue.laenge(), 2);
    }

    #[test]
    fn try_match_mit_einem_eintrag_ist_noop() {
        let queue = PairingQueue::neu();
        einreihen(&queue, "a");
        assert!(queue.try_match().is_none());
        assert_eq!(queue.snapshot(), vec![NodeId::from("a")]);
    }

    #[test]
    fn try_match_erzeugt_beide_nachrichten() {
        let queue = PairingQueue::neu();
        einreihen(&queue, "n1");
        einreihen(&queue, "n2");

        let paarung = queue.try_match().expect("Paarung erwartet");

        assert_eq!(paarung.head, NodeId::from("n1"));
        assert_eq!(paarung.second, NodeId::from("n2"));

        assert!(paarung.an_head.typ.ist_request());
        assert_eq!(paarung.an_head.sender_id, NodeId::from("n2"));
        assert_eq!(paarung.an_head.receiver_id, NodeId::from("n1"));
        assert!(paarung.an_head.data.is_empty());

        assert!(paarung.an_second.typ.ist_request());
        assert_eq!(paarung.an_second.data, DISCONNECT_DATA);
        assert_eq!(paarung.an_second.sender_id, NodeId::from("n1"));
        assert_eq!(paarung.an_second.receiver_id, NodeId::from("n2"));

        assert_eq!(queue.snapshot(), vec![NodeId::from("n1")]);
    }

    #[test]
    fn raum_kommt_jeweils_vom_gegenueber() {
        let queue = PairingQueue::neu();
        queue.enqueue(NodeId::from("h"), request("h", "raum-h"));
        queue.enqueue(NodeId::from("s"), request("s", "raum-s"));

        let paarung = queue.try_match().unwrap();
        assert_eq!(paarung.an_head.room_id.as_str(), "raum-s");
        assert_eq!(paarung.an_second.room_id.as_str(), "raum-h");
    }

    #[test]
    fn head_rotiert_und_wird_nie_verbraucht() {
        let queue = PairingQueue::neu();
        einreihen(&queue, "A");
        einreihen(&queue, "B");
        let erste = queue.try_match().unwrap();
        assert_eq!((erste.head.as_str(), erste.second.as_str()), ("A", "B"));

        einreihen(&queue, "C");
        let zweite = queue.try_match().unwrap();
        assert_eq!((zweite.head.as_str(), zweite.second.as_str()), ("A", "C"));

        einreihen(&queue, "D");
        let dritte = queue.try_match().unwrap();
        assert_eq!((dritte.head.as_str(), dritte.second.as_str()), ("A", "D"));

        assert_eq!(queue.snapshot(), vec![NodeId::from("A")]);
    }

    #[test]
    fn duplikate_sind_erlaubt() {
        let queue = PairingQueue::neu();
        einreihen(&queue, "a");
        einreihen(&queue, "a");
        let paarung = queue.try_match().unwrap();
        assert_eq!(paarung.head, paarung.second);
        assert_eq!(queue.laenge(), 1);
    }

    #[test]
    fn entfernen_loescht_alle_eintraege_eines_nodes() {
        let queue = PairingQueue::neu();
        for node in ["a", "b", "a", "c"] {
            einreihen(&queue, node);
        }
        assert_eq!(queue.entfernen(&NodeId::from("a")), 2);
        assert_eq!(queue.snapshot(), vec![NodeId::from("b"), NodeId::from("c")]);
        assert_eq!(queue.entfernen(&NodeId::from("x")), 0);
    }

    #[tokio::test]
    async fn abgleichen_stellt_zuerst_an_head_zu() {
        let registry = Registry::neu();
        let metriken = RelayMetrics::neu().unwrap();
        let router = NodeRouter::neu(registry.clone(), metriken);

        let (h1, mut rx1) = ConnectionHandle::neu(4);
        let (h2, mut rx2) = ConnectionHandle::neu(4);
        registry.upsert(&h1, &SessionId::new("s1"), &NodeId::from("n1"));
        registry.upsert(&h2, &SessionId::new("s2"), &NodeId::from("n2"));

        let queue = PairingQueue::neu();
        einreihen(&queue, "n1");
        einreihen(&queue, "n2");

        let (_, zustellung) = queue.abgleichen(&router).unwrap();
        assert!(zustellung.head.ist_zugestellt());
        assert!(zustellung.second.ist_zugestellt());

        assert_eq!(
            rx1.recv().await.unwrap(),
            r#"{"Type":"Request","SenderId":"n2","ReceiverId":"n1","RoomId":"MistNet"}"#
        );
        assert_eq!(
            rx2.recv().await.unwrap(),
            r#"{"Type":"Request","Data":"Disconnect","SenderId":"n1","ReceiverId":"n2","RoomId":"MistNet"}"#
        );
    }

    #[test]
    fn zustellfehler_macht_paarung_nicht_rueckgaengig() {
        let router = NodeRouter::neu(Registry::neu(), RelayMetrics::neu().unwrap());
        let queue = PairingQueue::neu();
        einreihen(&queue, "weg1");
        einreihen(&queue, "weg2");

        let (_, zustellung) = queue.abgleichen(&router).unwrap();
        assert_eq!(zustellung.head, Zustellung::EmpfaengerUnbekannt);
        assert_eq!(zustellung.second, Zustellung::EmpfaengerUnbekannt);
        assert_eq!(queue.snapshot(), vec![NodeId::from("weg1")]);
    }

    #[test]
    fn gleichzeitige_abgleiche_verlieren_keine_eintraege() {
        let queue = PairingQueue::neu();
        einreihen(&queue, "hub");

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let q = queue.clone();
                std::thread::spawn(move || {
                    let node = format!("neu{i}");
                    if q.enqueue(NodeId::from(node.as_str()), request(&node, "MistNet")) >= 2 {
                        let _ = q.try_match();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        // Jeder Abgleich verbraucht genau einen Eintrag
        while queue.try_match().is_some() {}
        assert_eq!(queue.laenge(), 1);
    }
}
