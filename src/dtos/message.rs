//! Message DTOs - Data Transfer Objects per messaggi

use crate::entities::{Message, MessageType, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageDTO {
    pub message_id: Option<i32>,
    pub conversation_id: Option<i32>,
    pub sender_id: Option<i32>,
    pub sender_username: Option<String>,
    pub sender_full_name: Option<String>,
    pub sender_avatar: Option<String>,
    pub content: Option<String>,
    pub message_type: Option<MessageType>,
    pub file_url: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_edited: Option<bool>,
    pub is_deleted: Option<bool>,
}

impl From<Message> for MessageDTO {
    fn from(value: Message) -> Self {
        Self {
            message_id: Some(value.message_id),
            conversation_id: Some(value.conversation_id),
            sender_id: Some(value.sender_id),
            sender_username: None,
            sender_full_name: None,
            sender_avatar: None,
            content: Some(value.content),
            message_type: Some(value.message_type),
            file_url: value.file_url,
            sent_at: Some(value.sent_at),
            is_edited: Some(value.is_edited),
            is_deleted: Some(value.is_deleted),
        }
    }
}

impl MessageDTO {
    /// Arricchisce il DTO con i dati del mittente (username, nome, avatar).
    /// I campi sender_* non stanno sulla tabella messages, vanno popolati qui.
    pub fn with_sender(mut self, sender: &User) -> Self {
        self.sender_username = Some(sender.username.clone());
        self.sender_full_name = Some(sender.display_name().to_string());
        self.sender_avatar = sender.profile_image_url.clone();
        self
    }
}

/// DTO in ingresso per l'invio di un nuovo messaggio
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct SendMessageDTO {
    pub receiver_id: i32,

    #[validate(length(min = 1, max = 5000, message = "Message content must be between 1 and 5000 characters"))]
    pub content: String,

    pub message_type: MessageType,
    pub file_url: Option<String>,
}

/// DTO interno per la creazione di un messaggio (senza message_id).
/// Il dispatcher lo costruisce dopo aver risolto la conversazione.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateMessageDTO {
    pub conversation_id: i32,
    pub sender_id: i32,
    pub content: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// DTO in ingresso per la modifica di un messaggio esistente
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct EditMessageDTO {
    pub message_id: i32,

    #[validate(length(min = 1, max = 5000, message = "Message content must be between 1 and 5000 characters"))]
    pub content: String,
}
