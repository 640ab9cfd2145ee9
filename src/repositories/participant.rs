//! ParticipantRepository - Repository per i partecipanti delle conversazioni

use crate::entities::ConversationParticipant;
use chrono::{DateTime, Utc};
use sqlx::{Error, MySqlPool};

// PARTICIPANT REPO
pub struct ParticipantRepository {
    connection_pool: MySqlPool,
}

impl ParticipantRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Insert a participant row. The (conversation_id, user_id) primary key
    /// makes a duplicate insert fail loudly instead of silently doubling up.
    pub async fn add(
        &self,
        conversation_id: &i32,
        user_id: &i32,
        joined_at: &DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, user_id, joined_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(joined_at)
        .execute(&self.connection_pool)
        .await?;

        Ok(())
    }

    /// Read a single participant row, None if the user is not in the conversation
    pub async fn find(
        &self,
        conversation_id: &i32,
        user_id: &i32,
    ) -> Result<Option<ConversationParticipant>, Error> {
        let participant = sqlx::query_as::<_, ConversationParticipant>(
            r#"
            SELECT conversation_id, user_id, joined_at, last_read_at
            FROM conversation_participants
            WHERE conversation_id = ? AND user_id = ?
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(participant)
    }

    /// All conversation ids a user participates in, used to rebuild group
    /// membership from scratch on every connect
    pub async fn find_conversation_ids_by_user(&self, user_id: &i32) -> Result<Vec<i32>, Error> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT conversation_id FROM conversation_participants WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(ids)
    }

    /// Find the conversation that has both users as participants, if any.
    /// Self-join sui partecipanti: nessun grafo di oggetti, una sola query.
    pub async fn find_conversation_between(
        &self,
        user_a: &i32,
        user_b: &i32,
    ) -> Result<Option<i32>, Error> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT a.conversation_id
            FROM conversation_participants a
            JOIN conversation_participants b ON b.conversation_id = a.conversation_id
            WHERE a.user_id = ? AND b.user_id = ?
            LIMIT 1
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(id)
    }

    /// The other participant of a two-party conversation
    pub async fn find_other_user_id(
        &self,
        conversation_id: &i32,
        user_id: &i32,
    ) -> Result<Option<i32>, Error> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT user_id FROM conversation_participants
            WHERE conversation_id = ? AND user_id <> ?
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(id)
    }

    /// Remove a participant from a conversation (the user leaves)
    pub async fn remove(&self, conversation_id: &i32, user_id: &i32) -> Result<(), Error> {
        sqlx::query(
            "DELETE FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.connection_pool)
        .await?;

        Ok(())
    }

    /// How many participants are still in the conversation
    pub async fn count(&self, conversation_id: &i32) -> Result<i64, Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(count)
    }

    /// Update the participant's last-read timestamp
    pub async fn update_last_read(
        &self,
        conversation_id: &i32,
        user_id: &i32,
        at: &DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE conversation_participants
            SET last_read_at = ?
            WHERE conversation_id = ? AND user_id = ?
            "#,
        )
        .bind(at)
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.connection_pool)
        .await?;

        Ok(())
    }
}
