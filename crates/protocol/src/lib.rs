//! mistnet-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert die Signaling-Nachricht, die zwischen den Nodes
//! und dem Relay als JSON-Text ueber WebSocket ausgetauscht wird.

pub mod signaling;

pub use signaling::{SignalingPayload, SignalingType, DISCONNECT_DATA};
