//! Registry – Wer ist als welcher Node verbunden?
//!
//! Haelt vier Zuordnungen, die immer gemeinsam unter einer Sperre
//! geaendert werden:
//!
//! ```text
//! ConnectionId -> NodeId        NodeId -> ConnectionHandle
//! SessionId    -> NodeId        NodeId -> SessionId
//! ```
//!
//! Fuer jeden registrierten Node existiert genau eine Verbindung und genau
//! eine Session, und die Rueckwaerts-Zuordnungen stimmen damit ueberein.

use mistnet_core::types::{ConnectionId, NodeId, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::ConnectionHandle;

/// Zuordnung Node <-> Verbindung <-> Session
///
/// Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    verbindung_zu_node: HashMap<ConnectionId, NodeId>,
    node_zu_verbindung: HashMap<NodeId, ConnectionHandle>,
    session_zu_node: HashMap<SessionId, NodeId>,
    node_zu_session: HashMap<NodeId, SessionId>,
}

impl RegistryInner {
    /// Entfernt alle vier Eintraege eines Nodes
    fn node_entfernen(&mut self, node: &NodeId) {
        if let Some(handle) = self.node_zu_verbindung.remove(node) {
            self.verbindung_zu_node.remove(&handle.id());
        }
        if let Some(session) = self.node_zu_session.remove(node) {
            self.session_zu_node.remove(&session);
        }
    }
}

impl Registry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert `node` auf `verbindung`/`session` und ueberschreibt
    /// fruehere Zuordnungen.
    ///
    /// Hat die Verbindung oder Session vorher einem anderen Node gehoert
    /// (SenderId gewechselt), wird dieser Node ausgetragen. Alte Verbindungen
    /// eines wiederverbundenen Nodes verlieren ihre Eintraege.
    ///
    /// Gibt die ausgetragenen Nodes zurueck (ohne `node` selbst).
    pub fn upsert(
        &self,
        verbindung: &ConnectionHandle,
        session: &SessionId,
        node: &NodeId,
    ) -> Vec<NodeId> {
        let mut inner = self.inner.lock();

        let vorherige = [
            inner.verbindung_zu_node.get(&verbindung.id()).cloned(),
            inner.session_zu_node.get(session).cloned(),
        ];
        let mut ausgetragen = Vec::new();
        for vorher in vorherige.into_iter().flatten() {
            if &vorher != node && !ausgetragen.contains(&vorher) {
                tracing::debug!(
                    alt = %vorher,
                    neu = %node,
                    session = %session,
                    "Verbindung wechselt die Node-Identitaet"
                );
                inner.node_entfernen(&vorher);
                ausgetragen.push(vorher);
            }
        }
        inner.node_entfernen(node);

        inner
            .verbindung_zu_node
            .insert(verbindung.id(), node.clone());
        inner
            .node_zu_verbindung
            .insert(node.clone(), verbindung.clone());
        inner.session_zu_node.insert(session.clone(), node.clone());
        inner.node_zu_session.insert(node.clone(), session.clone());
        ausgetragen
    }

    /// Gibt das Verbindungs-Handle eines Nodes zurueck
    pub fn resolve_connection(&self, node: &NodeId) -> Option<ConnectionHandle> {
        self.inner.lock().node_zu_verbindung.get(node).cloned()
    }

    /// Traegt den Node der Session aus
    ///
    /// Gibt den entfernten Node zurueck, `None` wenn die Session nie eine
    /// gueltige Nachricht gesendet hat oder der Node inzwischen auf einer
    /// anderen Session registriert ist.
    pub fn remove(&self, session: &SessionId) -> Option<NodeId> {
        let mut inner = self.inner.lock();
        let node = inner.session_zu_node.get(session).cloned()?;
        inner.node_entfernen(&node);
        Some(node)
    }

    pub fn node_fuer_session(&self, session: &SessionId) -> Option<NodeId> {
        self.inner.lock().session_zu_node.get(session).cloned()
    }

    pub fn session_fuer_node(&self, node: &NodeId) -> Option<SessionId> {
        self.inner.lock().node_zu_session.get(node).cloned()
    }

    pub fn node_fuer_verbindung(&self, verbindung: ConnectionId) -> Option<NodeId> {
        self.inner.lock().verbindung_zu_node.get(&verbindung).cloned()
    }

    /// Anzahl registrierter Nodes
    pub fn anzahl(&self) -> usize {
        self.inner.lock().node_zu_verbindung.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.anzahl() == 0
    }

    /// Prueft ob alle vier Zuordnungen zueinander passen
    pub fn ist_konsistent(&self) -> bool {
        let inner = self.inner.lock();
        let n = inner.node_zu_verbindung.len();
        if inner.verbindung_zu_node.len() != n
            || inner.session_zu_node.len() != n
            || inner.node_zu_session.len() != n
        {
            return false;
        }
        inner.node_zu_verbindung.iter().all(|(node, handle)| {
            inner.verbindung_zu_node.get(&handle.id()) == Some(node)
                && inner
                    .node_zu_session
                    .get(node)
                    .and_then(|s| inner.session_zu_node.get(s))
                    == Some(node)
        })
    }
}
