//! mistnet-signaling – Rendezvous- und Signaling-Relay
//!
//! Dieser Crate nimmt WebSocket-Verbindungen von Nodes an, ordnet jede
//! Verbindung einer vom Node gewaehlten Identitaet zu und leitet Signaling-
//! Nachrichten (Offer/Answer/Candidate) zwischen zwei Nodes weiter.
//! `Request`-Nachrichten landen in einer Pairing-Queue, die wartende Nodes
//! paarweise zusammenfuehrt.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket-Listener (SignalingServer, GET /signaling)
//!     |
//!     v
//! SessionHandler (pro Verbindung ein Task)
//!     |  State Machine: Offen -> Aktiv -> Geschlossen
//!     |
//!     +-- Registry      (Node <-> Verbindung <-> Session)
//!     +-- PairingQueue  (FIFO, rotierender Kopf)
//!     +-- NodeRouter    (Zustellung an einen Node)
//! ```
//!
//! Die Identitaet eines Nodes ist die `SenderId` seiner letzten Nachricht
//! und wird nicht authentifiziert.

pub mod connection;
pub mod error;
pub mod pairing;
pub mod registry;
pub mod router;
pub mod server_state;
pub mod session;
pub mod ws;

// Bequeme Re-Exporte
pub use connection::ConnectionHandle;
pub use error::{SignalingError, SignalingResult};
pub use pairing::{Paarung, PairingQueue};
pub use registry::Registry;
pub use router::{NodeRouter, Zustellung};
pub use server_state::{RelayConfig, RelayState};
pub use session::{SessionHandler, SessionZustand, Verarbeitung};
pub use ws::{signaling_router, SignalingServer, SIGNALING_PFAD};
