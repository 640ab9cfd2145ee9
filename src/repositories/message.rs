//! MessageRepository - Repository per la gestione dei messaggi

use super::{Create, Read};
use crate::dtos::CreateMessageDTO;
use crate::entities::Message;
use crate::entities::message::DELETED_MESSAGE_TOMBSTONE;
use chrono::{DateTime, Utc};
use sqlx::{Error, MySqlPool};

const MESSAGE_COLUMNS: &str = "message_id, conversation_id, sender_id, content, message_type, file_url, sent_at, is_edited, is_deleted";

// MESSAGE REPO
pub struct MessageRepository {
    connection_pool: MySqlPool,
}

impl MessageRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Get paginated messages for a conversation, soft-deleted rows excluded
    ///
    /// Supports both:
    /// - Loading recent messages (when `before_date` is None): gets the most recent `limit` messages
    /// - Loading older messages (when `before_date` is Some): gets `limit` messages before that date
    ///
    /// # Returns
    /// Messages ordered from newest to oldest (DESC), limited to `limit` count
    pub async fn find_many_paginated(
        &self,
        conversation_id: &i32,
        before_date: Option<&DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        let messages = if let Some(before) = before_date {
            sqlx::query_as::<_, Message>(&format!(
                r#"
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE conversation_id = ?
                  AND is_deleted = FALSE
                  AND sent_at < ?
                ORDER BY sent_at DESC
                LIMIT ?
                "#
            ))
            .bind(conversation_id)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.connection_pool)
            .await?
        } else {
            sqlx::query_as::<_, Message>(&format!(
                r#"
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE conversation_id = ?
                  AND is_deleted = FALSE
                ORDER BY sent_at DESC
                LIMIT ?
                "#
            ))
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(&self.connection_pool)
            .await?
        };

        Ok(messages)
    }

    /// The most recent visible message of a conversation, for the DM list
    pub async fn find_last_message(
        &self,
        conversation_id: &i32,
    ) -> Result<Option<Message>, Error> {
        let message = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE conversation_id = ? AND is_deleted = FALSE
            ORDER BY sent_at DESC
            LIMIT 1
            "#
        ))
        .bind(conversation_id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(message)
    }

    /// Ids of messages in the conversation authored by someone other than
    /// `reader_id` that have no read receipt for that reader yet
    pub async fn find_unread_ids(
        &self,
        conversation_id: &i32,
        reader_id: &i32,
    ) -> Result<Vec<i32>, Error> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT m.message_id
            FROM messages m
            LEFT JOIN read_receipts rr
                ON rr.message_id = m.message_id AND rr.user_id = ?
            WHERE m.conversation_id = ?
              AND m.sender_id <> ?
              AND rr.message_id IS NULL
            ORDER BY m.sent_at ASC
            "#,
        )
        .bind(reader_id)
        .bind(conversation_id)
        .bind(reader_id)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(ids)
    }

    /// Unread count for the conversation list, derived from read receipts
    pub async fn count_unread(
        &self,
        conversation_id: &i32,
        reader_id: &i32,
    ) -> Result<i64, Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages m
            LEFT JOIN read_receipts rr
                ON rr.message_id = m.message_id AND rr.user_id = ?
            WHERE m.conversation_id = ?
              AND m.sender_id <> ?
              AND m.is_deleted = FALSE
              AND rr.message_id IS NULL
            "#,
        )
        .bind(reader_id)
        .bind(conversation_id)
        .bind(reader_id)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(count)
    }

    /// Aggregate unread count across every conversation the reader
    /// participates in, for the badge on the DM list
    pub async fn count_unread_total(&self, reader_id: &i32) -> Result<i64, Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages m
            JOIN conversation_participants cp
                ON cp.conversation_id = m.conversation_id AND cp.user_id = ?
            LEFT JOIN read_receipts rr
                ON rr.message_id = m.message_id AND rr.user_id = ?
            WHERE m.sender_id <> ?
              AND m.is_deleted = FALSE
              AND rr.message_id IS NULL
            "#,
        )
        .bind(reader_id)
        .bind(reader_id)
        .bind(reader_id)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(count)
    }

    /// Replace the content of a message and flag it as edited
    pub async fn update_content(&self, message_id: &i32, content: &str) -> Result<(), Error> {
        sqlx::query("UPDATE messages SET content = ?, is_edited = TRUE WHERE message_id = ?")
            .bind(content)
            .bind(message_id)
            .execute(&self.connection_pool)
            .await?;

        Ok(())
    }

    /// Soft delete: the row stays, content becomes the tombstone string
    pub async fn mark_deleted(&self, message_id: &i32) -> Result<(), Error> {
        sqlx::query("UPDATE messages SET content = ?, is_deleted = TRUE WHERE message_id = ?")
            .bind(DELETED_MESSAGE_TOMBSTONE)
            .bind(message_id)
            .execute(&self.connection_pool)
            .await?;

        Ok(())
    }
}

impl Create<Message, CreateMessageDTO> for MessageRepository {
    async fn create(&self, data: &CreateMessageDTO) -> Result<Message, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content, message_type, file_url, sent_at, is_edited, is_deleted)
            VALUES (?, ?, ?, ?, ?, ?, FALSE, FALSE)
            "#,
        )
        .bind(data.conversation_id)
        .bind(data.sender_id)
        .bind(&data.content)
        .bind(&data.message_type)
        .bind(&data.file_url)
        .bind(data.sent_at)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;

        Ok(Message {
            message_id: new_id,
            conversation_id: data.conversation_id,
            sender_id: data.sender_id,
            content: data.content.clone(),
            message_type: data.message_type.clone(),
            file_url: data.file_url.clone(),
            sent_at: data.sent_at,
            is_edited: false,
            is_deleted: false,
        })
    }
}

impl Read<Message, i32> for MessageRepository {
    async fn read(&self, id: &i32) -> Result<Option<Message>, Error> {
        let message = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE message_id = ?
            "#
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(message)
    }
}
