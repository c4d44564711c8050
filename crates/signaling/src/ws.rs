//! WebSocket-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` stellt den Endpunkt `GET /signaling` bereit und
//! startet fuer jede WebSocket-Verbindung einen `SessionHandler`. Die
//! Session-ID ist die Transport-Adresse des Peers.
//!
//! ## Tasks pro Verbindung
//! ```text
//! WebSocket --split--> Lesehaelfte  -> SessionHandler (Registry, Queue, Router)
//!                  \-> Schreibhaelfte <- Schreib-Task <- ConnectionHandle (mpsc)
//! ```

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{future, SinkExt, StreamExt};
use mistnet_core::types::SessionId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::connection::ConnectionHandle;
use crate::server_state::RelayState;
use crate::session::SessionHandler;

/// Pfad des Signaling-Endpunkts
pub const SIGNALING_PFAD: &str = "/signaling";

/// Wie lange der Schreib-Task nach Sitzungsende noch leeren darf
const SCHREIB_NACHLAUF: Duration = Duration::from_secs(1);

/// Axum-Router fuer den Signaling-Endpunkt
pub fn signaling_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route(SIGNALING_PFAD, get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    tracing::debug!(peer = %peer_addr, "WebSocket-Upgrade angefragt");
    ws.on_upgrade(move |socket| verbindung_bedienen(socket, peer_addr, state))
}

/// Bedient eine WebSocket-Verbindung bis zu ihrem Ende
async fn verbindung_bedienen(socket: WebSocket, peer_addr: SocketAddr, state: Arc<RelayState>) {
    let session = SessionId::aus_adresse(peer_addr);
    let (mut ausgang, eingang) = socket.split();
    let (verbindung, mut send_queue) = ConnectionHandle::neu(state.config.send_queue_groesse);

    state.metriken.open_connections.inc();

    let schreib_session = session.clone();
    let mut schreiber = tokio::spawn(async move {
        while let Some(text) = send_queue.recv().await {
            if let Err(e) = ausgang.send(Message::Text(text)).await {
                tracing::warn!(
                    session = %schreib_session,
                    fehler = %e,
                    "WebSocket-Senden fehlgeschlagen"
                );
                break;
            }
        }
        let _ = ausgang.close().await;
    });

    // Nur Text- und UTF-8-Binaerframes erreichen den SessionHandler,
    // ein Close-Frame beendet den Stream.
    let lese_session = session.clone();
    let texte = eingang
        .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
        .filter_map(move |frame| {
            let text = match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(daten)) => match String::from_utf8(daten) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        tracing::warn!(session = %lese_session, "Binaerframe ist kein UTF-8");
                        None
                    }
                },
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            };
            future::ready(text)
        });

    // `verarbeiten` verbraucht das Handle, die Registry gibt ihres beim
    // Schliessen frei. Danach endet der Schreib-Task nach dem Leeren der
    // Queue von selbst und schliesst die WebSocket-Verbindung.
    SessionHandler::neu(Arc::clone(&state), session.clone())
        .verarbeiten(Box::pin(texte), verbindung)
        .await;

    if tokio::time::timeout(SCHREIB_NACHLAUF, &mut schreiber)
        .await
        .is_err()
    {
        tracing::debug!(session = %session, "Schreib-Task nach Nachlauf abgebrochen");
        schreiber.abort();
    }
    state.metriken.open_connections.dec();
}

/// WebSocket-Signaling-Server
///
/// Bindet einen TCP-Socket und bedient den Signaling-Router sowie optionale
/// Zusatz-Routen (z.B. `/health`, `/metrics`).
pub struct SignalingServer {
    state: Arc<RelayState>,
    bind_addr: SocketAddr,
    zusatz: Option<Router>,
}

impl SignalingServer {
    /// Erstellt einen neuen SignalingServer
    pub fn neu(state: Arc<RelayState>, bind_addr: SocketAddr) -> Self {
        Self {
            state,
            bind_addr,
            zusatz: None,
        }
    }

    /// Haengt weitere Routen an denselben Listener
    pub fn mit_router(mut self, router: Router) -> Self {
        self.zusatz = Some(match self.zusatz.take() {
            Some(bestehend) => bestehend.merge(router),
            None => router,
        });
        self
    }

    /// Bindet den Port und bedient Verbindungen bis `shutdown_rx` `true` meldet
    ///
    /// Ein Bind-Fehler wird an den Aufrufer zurueckgegeben.
    pub async fn starten(self, shutdown_rx: tokio::sync::watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.mit_listener_starten(listener, shutdown_rx).await
    }

    /// Wie `starten`, aber auf einem bereits gebundenen Listener
    pub async fn mit_listener_starten(
        self,
        listener: TcpListener,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let lokale_addr = listener.local_addr()?;
        tracing::info!(
            adresse = %lokale_addr,
            raum = %self.state.config.room_id,
            "[MistSignalingServer] Start"
        );

        let mut app = signaling_router(Arc::clone(&self.state));
        if let Some(zusatz) = self.zusatz {
            app = app.merge(zusatz);
        }
        let app = app.layer(mistnet_observability::request_trace_layer());

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
        })
        .await?;

        tracing::info!("Signaling-Server gestoppt");
        Ok(())
    }

    /// Gibt die Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
