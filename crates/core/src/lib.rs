//! mistnet-core – Gemeinsame Typen des Signaling-Relays
//!
//! Dieses Crate stellt die Identifikationstypen bereit, die vom Protokoll-
//! und vom Signaling-Crate gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{ConnectionId, NodeId, RoomId, SessionId};
