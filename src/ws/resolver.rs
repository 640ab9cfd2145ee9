//! Conversation Resolver - find-or-create idempotente per coppia di utenti
//!
//! Due "primi messaggi" simultanei tra la stessa coppia non devono mai creare
//! due conversazioni: la sequenza check-then-create gira dentro una sezione
//! critica in-process con chiave (min, max) della coppia, quindi l'ordine dei
//! due utenti non conta.

use crate::core::{AppState, DispatchError};
use crate::ws::locks::{KeyedLockGuard, KeyedLocks};
use chrono::Utc;
use tracing::{debug, info, instrument};

/// Lock di breve durata, uno per coppia non ordinata di utenti.
/// Le entry vivono solo per la durata della sezione critica.
pub struct PairLocks {
    locks: KeyedLocks<(i32, i32)>,
}

impl PairLocks {
    pub fn new() -> Self {
        PairLocks {
            locks: KeyedLocks::new(),
        }
    }

    /// Lock per la coppia, normalizzata a (min, max): l'ordine dei due utenti
    /// non conta
    pub async fn lock(&self, user_a: i32, user_b: i32) -> KeyedLockGuard<'_, (i32, i32)> {
        self.locks.lock((user_a.min(user_b), user_a.max(user_b))).await
    }
}

impl Default for PairLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Trova la conversazione tra i due utenti o la crea se non esiste ancora.
///
/// Alla creazione vengono inseriti conversazione + due righe partecipante
/// (joined_at = adesso) e tutte le connessioni live di entrambi gli utenti
/// vengono iscritte al nuovo gruppo, così il primo ReceiveMessage raggiunge
/// anche un destinatario che non ha mai fatto JoinConversation.
#[instrument(skip(state), fields(user_a, user_b))]
pub async fn find_or_create_conversation(
    state: &AppState,
    user_a: i32,
    user_b: i32,
) -> Result<i32, DispatchError> {
    let _guard = state.pair_locks.lock(user_a, user_b).await;

    if let Some(existing) = state
        .participants
        .find_conversation_between(&user_a, &user_b)
        .await?
    {
        debug!(conversation_id = existing, "Conversation already exists");
        return Ok(existing);
    }

    let now = Utc::now();
    let conversation = state.conversations.create(&now).await?;
    state
        .participants
        .add(&conversation.conversation_id, &user_a, &now)
        .await?;
    state
        .participants
        .add(&conversation.conversation_id, &user_b, &now)
        .await?;

    // entrambi gli utenti, se online, entrano subito nel gruppo
    for user_id in [user_a, user_b] {
        for conn_id in state.presence.connections_for(&user_id) {
            state.groups.join(&conversation.conversation_id, conn_id);
        }
    }

    info!(
        conversation_id = conversation.conversation_id,
        "New conversation created between users"
    );
    Ok(conversation.conversation_id)
}

/// Variante usata dal dispatcher: verifica prima che il destinatario esista
pub async fn resolve_for_send(
    state: &AppState,
    sender_id: i32,
    receiver_id: i32,
) -> Result<i32, DispatchError> {
    if !state.user.exists(&receiver_id).await? {
        return Err(DispatchError::NotFound("Recipient user not found"));
    }
    find_or_create_conversation(state, sender_id, receiver_id).await
}
