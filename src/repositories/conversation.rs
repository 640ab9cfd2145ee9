//! ConversationRepository - Repository per la gestione delle conversazioni

use super::Read;
use crate::entities::Conversation;
use chrono::{DateTime, Utc};
use sqlx::{Error, MySqlPool};

// CONVERSATION REPO
pub struct ConversationRepository {
    connection_pool: MySqlPool,
}

impl ConversationRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Create a new empty conversation, participants are inserted separately
    pub async fn create(&self, now: &DateTime<Utc>) -> Result<Conversation, Error> {
        let result = sqlx::query(
            "INSERT INTO conversations (created_at, last_message_at) VALUES (?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;

        Ok(Conversation {
            conversation_id: new_id,
            created_at: *now,
            last_message_at: *now,
        })
    }

    /// Update the last-activity timestamp, called after every persisted send
    pub async fn touch_last_message(
        &self,
        conversation_id: &i32,
        at: &DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE conversations SET last_message_at = ? WHERE conversation_id = ?")
            .bind(at)
            .bind(conversation_id)
            .execute(&self.connection_pool)
            .await?;

        Ok(())
    }

    /// Hard delete of a conversation left by every participant: receipts,
    /// messages e la riga della conversazione spariscono in una transazione
    /// (le foreign key impongono quest'ordine)
    pub async fn delete(&self, conversation_id: &i32) -> Result<(), Error> {
        let mut tx = self.connection_pool.begin().await?;

        sqlx::query(
            r#"
            DELETE rr FROM read_receipts rr
            JOIN messages m ON m.message_id = rr.message_id
            WHERE m.conversation_id = ?
            "#,
        )
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM conversation_participants WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM conversations WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// All conversations a user participates in, most recently active first
    pub async fn find_by_user(&self, user_id: &i32) -> Result<Vec<Conversation>, Error> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.conversation_id, c.created_at, c.last_message_at
            FROM conversations c
            JOIN conversation_participants cp ON cp.conversation_id = c.conversation_id
            WHERE cp.user_id = ?
            ORDER BY c.last_message_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(conversations)
    }
}

impl Read<Conversation, i32> for ConversationRepository {
    async fn read(&self, id: &i32) -> Result<Option<Conversation>, Error> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT conversation_id, created_at, last_message_at
            FROM conversations
            WHERE conversation_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(conversation)
    }
}
