//! WebSocket Module - Gestione WebSocket per comunicazione real-time
//!
//! Questo modulo contiene il sottosistema real-time del servizio DM:
//! - Gestione upgrade HTTP -> WebSocket
//! - Presence Registry (utenti online, multi-dispositivo)
//! - Group Membership (connessioni iscritte per conversazione)
//! - Conversation Resolver (find-or-create idempotente)
//! - Message Dispatcher (persist-then-broadcast)
//! - Ciclo di vita della connessione (registrazione, cleanup, eventi online/offline)

pub mod connection;
pub mod dispatcher;
pub mod groups;
pub mod locks;
pub mod presence;
pub mod resolver;

// Re-exports pubblici
pub use connection::handle_socket;
pub use groups::GroupRegistry;
pub use presence::{ConnId, Delivery, PresenceRegistry};

use crate::{AppState, entities::User};
use axum::{
    Extension,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

/// Capienza della coda di uscita per connessione: oltre questa soglia gli
/// eventi vengono scartati invece di bloccare chi fa broadcast
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Intervallo minimo tra due frame in ingresso dalla stessa connessione
pub const RATE_LIMITER_MILLIS: u64 = 50;

/// Connessione silente oltre questo limite = disconnessione
pub const TIMEOUT_DURATION_SECONDS: u64 = 300;

/// Entry point per gestire richieste di upgrade WebSocket.
/// L'utente arriva già autenticato dal middleware JWT: se l'autenticazione
/// fallisce la richiesta muore lì, senza mai toccare il registro di presenza.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>, // ottenuto dall'autenticazione JWT
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, current_user))
}
