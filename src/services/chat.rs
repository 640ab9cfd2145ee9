//! Chat services - Superficie HTTP di sola lettura per le conversazioni
//!
//! La scrittura (invio, edit, delete, read) passa dal WebSocket: queste route
//! servono al client per costruire la lista DM e la cronologia alla (ri)apertura.

use crate::core::{AppError, AppState};
use crate::dtos::{ConversationDTO, MessageDTO, MessagesQuery, ParticipantDTO};
use crate::entities::{ConversationParticipant, User};
use crate::repositories::Read;
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Numero massimo di messaggi per pagina
const MESSAGES_PAGE_SIZE: i64 = 50;

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<Vec<ConversationDTO>>, AppError> {
    debug!("Listing conversations for user");

    let conversations = state
        .conversations
        .find_by_user(&current_user.user_id)
        .await?;

    let mut conversation_dtos = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let other_user_id = match state
            .participants
            .find_other_user_id(&conversation.conversation_id, &current_user.user_id)
            .await?
        {
            Some(id) => id,
            None => {
                warn!(
                    conversation_id = conversation.conversation_id,
                    "Conversation without a second participant, skipping"
                );
                continue;
            }
        };

        let other_user = match state.user.read(&other_user_id).await? {
            Some(user) => user,
            None => continue,
        };

        let unread_count = state
            .msg
            .count_unread(&conversation.conversation_id, &current_user.user_id)
            .await?;

        let last_message = state
            .msg
            .find_last_message(&conversation.conversation_id)
            .await?
            .map(|message| {
                // il mittente è per forza uno dei due partecipanti
                let sender = if message.sender_id == current_user.user_id {
                    &current_user
                } else {
                    &other_user
                };
                MessageDTO::from(message).with_sender(sender)
            });

        conversation_dtos.push(ConversationDTO {
            conversation_id: conversation.conversation_id,
            other_user: ParticipantDTO::from_user(
                &other_user,
                state.presence.is_online(&other_user.user_id),
            ),
            last_message,
            unread_count,
            last_message_at: conversation.last_message_at,
            created_at: conversation.created_at,
        });
    }

    info!("Retrieved {} conversations", conversation_dtos.len());
    Ok(Json(conversation_dtos))
}

/// Badge totale dei non letti, derivato dalle ricevute di lettura su tutte
/// le conversazioni dell'utente
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<i64>, AppError> {
    let count = state.msg.count_unread_total(&current_user.user_id).await?;
    debug!(count, "Computed total unread count");
    Ok(Json(count))
}

/// L'utente abbandona la conversazione; quando se ne va anche l'ultimo
/// partecipante, la conversazione e i suoi messaggi vengono eliminati.
/// Le connessioni live dell'utente escono subito dal gruppo.
#[instrument(skip(state, participant), fields(conversation_id = %conversation_id, user_id = %participant.user_id))]
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<i32>,
    Extension(participant): Extension<ConversationParticipant>, // dal conversation_membership_middleware
) -> Result<impl IntoResponse, AppError> {
    state
        .participants
        .remove(&conversation_id, &participant.user_id)
        .await?;

    for conn_id in state.presence.connections_for(&participant.user_id) {
        state.groups.leave_conversation(&conversation_id, conn_id);
    }

    let remaining = state.participants.count(&conversation_id).await?;
    if remaining == 0 {
        state.conversations.delete(&conversation_id).await?;
        info!("Last participant left, conversation removed");
    } else {
        info!(remaining, "Participant left the conversation");
    }

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, participant), fields(conversation_id = %conversation_id, user_id = %participant.user_id))]
pub async fn get_conversation_messages(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<i32>,
    Query(params): Query<MessagesQuery>,
    Extension(participant): Extension<ConversationParticipant>, // dal conversation_membership_middleware
) -> Result<Json<Vec<MessageDTO>>, AppError> {
    debug!("Fetching conversation messages");

    let messages = state
        .msg
        .find_many_paginated(
            &conversation_id,
            params.before_date.as_ref(),
            MESSAGES_PAGE_SIZE,
        )
        .await?;

    info!("Retrieved {} messages for conversation", messages.len());

    // in una DM i mittenti possibili sono solo i due partecipanti
    let current_user = state.user.read(&participant.user_id).await?;
    let other_user = match state
        .participants
        .find_other_user_id(&conversation_id, &participant.user_id)
        .await?
    {
        Some(id) => state.user.read(&id).await?,
        None => None,
    };

    let messages_dto: Vec<MessageDTO> = messages
        .into_iter()
        .map(|message| {
            let sender = [&current_user, &other_user]
                .into_iter()
                .flatten()
                .find(|user| user.user_id == message.sender_id);
            match sender {
                Some(user) => MessageDTO::from(message).with_sender(user),
                None => MessageDTO::from(message),
            }
        })
        .collect();

    Ok(Json(messages_dto))
}
