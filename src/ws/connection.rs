//! WebSocket Connection Management - ciclo di vita di una connessione
//!
//! Macchina a stati per connessione: Connecting -> Connected -> Disconnected
//! (terminale). L'autenticazione avviene PRIMA dell'upgrade (middleware JWT):
//! qui la connessione è già Connected con un utente verificato.
//!
//! All'ingresso: registrazione in presenza, eventuale broadcast "user online",
//! ricostruzione completa delle membership di gruppo dallo storage.
//! All'uscita (chiusura trasporto, errore o timeout, indifferente): leave da
//! tutti i gruppi, unregister, ed esattamente un broadcast "user offline" se
//! era l'ultima connessione dell'utente.

use crate::ws::{OUTBOUND_QUEUE_CAPACITY, RATE_LIMITER_MILLIS, TIMEOUT_DURATION_SECONDS};
use crate::{
    AppState,
    core::DispatchError,
    dtos::{ClientEvent, OnlineStatusDTO, ServerEvent},
    entities::User,
    ws::dispatcher,
    ws::presence::ConnId,
};
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, channel};
use tokio::time::{Duration, interval, timeout};
use tracing::{error, info, instrument, warn};

#[instrument(skip(ws, state, current_user), fields(user_id = %current_user.user_id))]
pub async fn handle_socket(ws: WebSocket, state: Arc<AppState>, current_user: User) {
    info!("WebSocket connection established");

    let user_id = current_user.user_id;
    let conn_id = state.presence.next_handle();

    // Coda di uscita bounded: un peer lento non deve mai bloccare chi fa broadcast
    let (out_tx, out_rx) = channel::<Arc<ServerEvent>>(OUTBOUND_QUEUE_CAPACITY);

    let was_offline = state.presence.register(user_id, conn_id, out_tx);
    if was_offline {
        state.presence.broadcast_all(Arc::new(ServerEvent::UserOnline(OnlineStatusDTO {
            user_id,
            is_online: true,
        })));
    }

    // Membership ricostruita da zero dallo storage a ogni connessione,
    // nessun diff incrementale
    match state.participants.find_conversation_ids_by_user(&user_id).await {
        Ok(conversation_ids) => {
            info!(count = conversation_ids.len(), "User conversations loaded");
            for conversation_id in &conversation_ids {
                state.groups.join(conversation_id, conn_id);
            }
        }
        Err(e) => {
            error!("Failed to load user conversations: {:?}", e);
            teardown(&state, conn_id);
            return;
        }
    }

    let (ws_tx, ws_rx) = ws.split();

    // task dedicato alla scrittura: svuota la coda di uscita sul socket
    tokio::spawn(write_ws(conn_id, ws_tx, out_rx));

    // task in ascolto del websocket, fa anche il cleanup finale
    tokio::spawn(listen_ws(conn_id, current_user, ws_rx, state));
}

#[instrument(skip(websocket_tx, out_rx), fields(conn_id))]
pub async fn write_ws(
    conn_id: ConnId,
    mut websocket_tx: SplitSink<WebSocket, Message>,
    mut out_rx: Receiver<Arc<ServerEvent>>,
) {
    info!("Write task started");

    // il canale si chiude quando la connessione viene tolta dal registro
    while let Some(event) = out_rx.recv().await {
        let json = match serde_json::to_string(event.as_ref()) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize event: {:?}", e);
                continue;
            }
        };
        if let Err(e) = websocket_tx.send(Message::Text(Utf8Bytes::from(json))).await {
            warn!("Failed to send event, closing write task: {:?}", e);
            break;
        }
    }

    info!("Write task terminated");
}

#[instrument(skip(websocket_rx, state, current_user), fields(conn_id, user_id = %current_user.user_id))]
pub async fn listen_ws(
    conn_id: ConnId,
    current_user: User,
    mut websocket_rx: SplitStream<WebSocket>,
    state: Arc<AppState>,
) {
    info!("Listen task started");

    let mut rate_limiter = interval(Duration::from_millis(RATE_LIMITER_MILLIS));
    let timeout_duration = Duration::from_secs(TIMEOUT_DURATION_SECONDS);

    loop {
        match timeout(timeout_duration, websocket_rx.next()).await {
            Ok(Some(msg_result)) => {
                rate_limiter.tick().await;

                let msg = match msg_result {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("WebSocket error: {:?}", e);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            // l'operazione viene completata (persist + broadcast)
                            // anche se nel frattempo il client chiude: gli altri
                            // partecipanti devono comunque ricevere l'update
                            process_event(&state, conn_id, &current_user, event).await;
                        }
                        Err(e) => {
                            warn!("Failed to deserialize client event: {:?}", e);
                            send_error_to_conn(&state, conn_id, 400, "Malformed event".to_string());
                        }
                    },
                    Message::Close(_) => {
                        info!("Close message received");
                        break;
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                info!("WebSocket stream ended");
                break;
            }
            Err(_) => {
                warn!(timeout_secs = TIMEOUT_DURATION_SECONDS, "Connection timeout");
                break;
            }
        }
    }

    // Cleanup
    info!("Cleaning up connection");
    teardown(&state, conn_id);
    info!("Listen task terminated");
}

/// Smista una singola operazione del client al dispatcher. Un'operazione
/// rifiutata produce un evento Error sul canale del chiamante, la connessione
/// resta aperta.
async fn process_event(state: &AppState, conn_id: ConnId, current_user: &User, event: ClientEvent) {
    let outcome: Result<(), DispatchError> = match event {
        ClientEvent::SendMessage(dto) => dispatcher::send_message(state, current_user, dto)
            .await
            .map(|_| ()),
        ClientEvent::EditMessage(dto) => dispatcher::edit_message(state, current_user, dto)
            .await
            .map(|_| ()),
        ClientEvent::DeleteMessage { message_id } => {
            dispatcher::delete_message(state, current_user, message_id).await
        }
        ClientEvent::MarkRead { conversation_id } => {
            dispatcher::mark_read(state, current_user, conversation_id)
                .await
                .map(|_| ())
        }
        ClientEvent::Typing {
            conversation_id,
            is_typing,
        } => {
            dispatcher::typing_indicator(state, current_user, conversation_id, is_typing, conn_id);
            Ok(())
        }
        ClientEvent::JoinConversation { conversation_id } => {
            dispatcher::join_conversation(state, current_user, conversation_id, conn_id).await
        }
        ClientEvent::GetOnlineStatus { user_ids } => {
            let statuses = dispatcher::online_status(state, &user_ids);
            state
                .presence
                .deliver(conn_id, Arc::new(ServerEvent::OnlineStatus(statuses)));
            Ok(())
        }
    };

    if let Err(e) = outcome {
        warn!("Operation rejected: {}", e);
        send_error_to_conn(state, conn_id, e.code(), e.message());
    }
}

/// Invia un evento di errore alla sola connessione chiamante
fn send_error_to_conn(state: &AppState, conn_id: ConnId, code: u16, message: String) {
    state
        .presence
        .deliver(conn_id, Arc::new(ServerEvent::Error { code, message }));
}

/// Uscita dallo stato Connected: leave da tutti i gruppi, unregister dalla
/// presenza e, se era l'ultima connessione dell'utente, broadcast offline
fn teardown(state: &AppState, conn_id: ConnId) {
    state.groups.leave(conn_id);
    if let Some(user_id) = state.presence.unregister(conn_id) {
        state.presence.broadcast_all(Arc::new(ServerEvent::UserOffline(OnlineStatusDTO {
            user_id,
            is_online: false,
        })));
    }
}
