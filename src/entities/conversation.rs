//! Conversation entity - Entità conversazione (DM a due partecipanti)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    pub conversation_id: i32,
    pub created_at: DateTime<Utc>,
    // ultimo istante di attività, aggiornato ad ogni messaggio inviato
    pub last_message_at: DateTime<Utc>,
}
