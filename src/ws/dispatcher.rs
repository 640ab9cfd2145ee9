//! Message Dispatcher - orchestrazione di invio, modifica, cancellazione e lettura
//!
//! Ogni operazione segue lo stesso schema: valida, persiste tramite i
//! repository, e SOLO a scrittura completata fa il fan-out degli eventi ai
//! gruppi interessati. Mai broadcast-before-durable-write.
//!
//! Gli invii concorrenti nella stessa conversazione vengono serializzati con
//! un mutex per conversazione: un invio completa la sua sequenza
//! persist-then-broadcast prima che inizi il successivo, così l'ordine
//! osservato dalle connessioni coincide con l'ordine di commit.
//!
//! Un fallimento dello storage fa fallire la singola operazione e viene
//! riportato al chiamante come errore ritentabile: il dispatcher non ritenta
//! mai da solo, per non duplicare gli invii.

use crate::core::{AppState, DispatchError};
use crate::dtos::{
    CreateMessageDTO, EditMessageDTO, MessageDTO, OnlineStatusDTO, SendMessageDTO, ServerEvent,
    TypingDTO,
};
use crate::entities::User;
use crate::repositories::{Create, Read};
use crate::ws::presence::ConnId;
use crate::ws::resolver;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use validator::Validate;

/// Invia un messaggio: risolve la conversazione, persiste, poi fa il fan-out.
///
/// Il gruppo della conversazione riceve `ReceiveMessage`; il canale personale
/// del destinatario riceve `NewMessageNotification` su OGNI suo dispositivo,
/// anche se non è ancora iscritto al gruppo (caso del primo messaggio di una
/// conversazione appena creata). Destinatario offline = notifica no-op.
#[instrument(skip(state, sender, dto), fields(sender_id = %sender.user_id, receiver_id = %dto.receiver_id))]
pub async fn send_message(
    state: &AppState,
    sender: &User,
    dto: SendMessageDTO,
) -> Result<MessageDTO, DispatchError> {
    dto.validate()?;
    if dto.receiver_id == sender.user_id {
        return Err(DispatchError::Validation(
            "Cannot send a message to yourself".to_string(),
        ));
    }

    let conversation_id = resolver::resolve_for_send(state, sender.user_id, dto.receiver_id).await?;

    let _guard = state.send_locks.lock(conversation_id).await;

    let now = Utc::now();
    let message = state
        .msg
        .create(&CreateMessageDTO {
            conversation_id,
            sender_id: sender.user_id,
            content: dto.content,
            message_type: dto.message_type,
            file_url: dto.file_url,
            sent_at: now,
        })
        .await?;
    state
        .conversations
        .touch_last_message(&conversation_id, &now)
        .await?;

    let message_dto = MessageDTO::from(message).with_sender(sender);

    let receive = Arc::new(ServerEvent::ReceiveMessage(message_dto.clone()));
    state
        .groups
        .broadcast(&state.presence, &conversation_id, receive);

    let notification = Arc::new(ServerEvent::NewMessageNotification(message_dto.clone()));
    state.presence.send_to_user(&dto.receiver_id, notification);

    info!(
        message_id = ?message_dto.message_id,
        conversation_id, "Message sent and fanned out"
    );
    Ok(message_dto)
}

/// Modifica un messaggio esistente. Solo il mittente originale può farlo.
/// Un messaggio soft-deleted resta modificabile dal suo mittente.
#[instrument(skip(state, editor, dto), fields(editor_id = %editor.user_id, message_id = %dto.message_id))]
pub async fn edit_message(
    state: &AppState,
    editor: &User,
    dto: EditMessageDTO,
) -> Result<MessageDTO, DispatchError> {
    dto.validate()?;

    let message = state
        .msg
        .read(&dto.message_id)
        .await?
        .ok_or(DispatchError::NotFound("Message not found"))?;

    if message.sender_id != editor.user_id {
        return Err(DispatchError::Forbidden(
            "You can only edit your own messages",
        ));
    }

    let _guard = state.send_locks.lock(message.conversation_id).await;

    state.msg.update_content(&dto.message_id, &dto.content).await?;

    let mut updated = message;
    updated.content = dto.content;
    updated.is_edited = true;

    let conversation_id = updated.conversation_id;
    let message_dto = MessageDTO::from(updated).with_sender(editor);

    let event = Arc::new(ServerEvent::MessageEdited(message_dto.clone()));
    state
        .groups
        .broadcast(&state.presence, &conversation_id, event);

    info!(conversation_id, "Message edited and broadcast");
    Ok(message_dto)
}

/// Soft delete: la riga resta, il contenuto diventa il tombstone.
/// L'evento broadcast porta SOLO gli id, mai il contenuto precedente.
#[instrument(skip(state, requester), fields(requester_id = %requester.user_id, message_id))]
pub async fn delete_message(
    state: &AppState,
    requester: &User,
    message_id: i32,
) -> Result<(), DispatchError> {
    let message = state
        .msg
        .read(&message_id)
        .await?
        .ok_or(DispatchError::NotFound("Message not found"))?;

    if message.sender_id != requester.user_id {
        return Err(DispatchError::Forbidden(
            "You can only delete your own messages",
        ));
    }

    let _guard = state.send_locks.lock(message.conversation_id).await;

    state.msg.mark_deleted(&message_id).await?;

    let event = Arc::new(ServerEvent::MessageDeleted {
        message_id,
        conversation_id: message.conversation_id,
    });
    state
        .groups
        .broadcast(&state.presence, &message.conversation_id, event);

    info!(conversation_id = message.conversation_id, "Message soft-deleted");
    Ok(())
}

/// Segna come letti tutti i messaggi non ancora letti della conversazione.
///
/// Idempotente: la seconda chiamata trova zero messaggi non letti e l'insert
/// delle ricevute è comunque ignore-on-duplicate. Il resto del gruppo riceve
/// `MessagesRead` con gli id interessati, le connessioni del lettore no.
#[instrument(skip(state, reader), fields(reader_id = %reader.user_id, conversation_id))]
pub async fn mark_read(
    state: &AppState,
    reader: &User,
    conversation_id: i32,
) -> Result<Vec<i32>, DispatchError> {
    state
        .participants
        .find(&conversation_id, &reader.user_id)
        .await?
        .ok_or(DispatchError::Forbidden(
            "You are not a participant in this conversation",
        ))?;

    let unread_ids = state
        .msg
        .find_unread_ids(&conversation_id, &reader.user_id)
        .await?;

    let now = Utc::now();
    state
        .receipts
        .create_many_ignore(&unread_ids, &reader.user_id, &now)
        .await?;
    state
        .participants
        .update_last_read(&conversation_id, &reader.user_id, &now)
        .await?;

    let event = Arc::new(ServerEvent::MessagesRead {
        conversation_id,
        user_id: reader.user_id,
        message_ids: unread_ids.clone(),
    });
    state
        .groups
        .broadcast_except_user(&state.presence, &conversation_id, &reader.user_id, event);

    info!(read_count = unread_ids.len(), "Messages marked as read");
    Ok(unread_ids)
}

/// Indicatore di digitazione: effimero, nessuna persistenza. Viene esclusa
/// solo la connessione chiamante: gli altri dispositivi dello stesso utente
/// lo ricevono comunque.
#[instrument(skip(state, user), fields(user_id = %user.user_id, conversation_id, is_typing, conn_id))]
pub fn typing_indicator(
    state: &AppState,
    user: &User,
    conversation_id: i32,
    is_typing: bool,
    conn_id: ConnId,
) {
    let event = Arc::new(ServerEvent::UserTyping(TypingDTO {
        conversation_id,
        user_id: user.user_id,
        username: user.username.clone(),
        is_typing,
    }));
    state
        .groups
        .broadcast_except_conn(&state.presence, &conversation_id, conn_id, event);
}

/// Iscrizione esplicita al gruppo di una conversazione (es. appena creata
/// lato REST), consentita solo ai partecipanti
#[instrument(skip(state, user), fields(user_id = %user.user_id, conversation_id, conn_id))]
pub async fn join_conversation(
    state: &AppState,
    user: &User,
    conversation_id: i32,
    conn_id: ConnId,
) -> Result<(), DispatchError> {
    state
        .participants
        .find(&conversation_id, &user.user_id)
        .await?
        .ok_or(DispatchError::Forbidden(
            "You are not a participant in this conversation",
        ))?;

    state.groups.join(&conversation_id, conn_id);
    debug!("Connection joined conversation group");
    Ok(())
}

/// Stato di presenza per una lista di utenti, lettura pura dal registro
pub fn online_status(state: &AppState, user_ids: &[i32]) -> Vec<OnlineStatusDTO> {
    user_ids
        .iter()
        .map(|user_id| OnlineStatusDTO {
            user_id: *user_id,
            is_online: state.presence.is_online(user_id),
        })
        .collect()
}
