//! ConversationParticipant entity - Entità partecipante di una conversazione

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chiave primaria composta (conversation_id, user_id): un utente compare
/// al massimo una volta per conversazione.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct ConversationParticipant {
    pub conversation_id: i32,
    pub user_id: i32,
    pub joined_at: DateTime<Utc>,
    // "ho letto la conversazione fino a questo istante, istante INCLUSO"
    pub last_read_at: Option<DateTime<Utc>>,
}
