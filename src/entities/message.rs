//! Message entity - Entità messaggio

use super::enums::MessageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stringa fissa che sostituisce il contenuto di un messaggio soft-deleted.
/// La riga resta nel database, solo il contenuto viene rimpiazzato.
pub const DELETED_MESSAGE_TOMBSTONE: &str = "This message has been deleted";

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub message_id: i32,
    pub conversation_id: i32,
    pub sender_id: i32,
    pub content: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    // il server si aspetta una stringa litterale iso8601 che viene parsata in oggetto DateTime di tipo UTC
    // la conversione viene fatta in automatico da serde, la feature è stata abilitata
    pub sent_at: DateTime<Utc>,
    pub is_edited: bool,
    pub is_deleted: bool,
}
