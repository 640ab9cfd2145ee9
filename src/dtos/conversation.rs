//! Conversation DTOs - Data Transfer Objects per la lista conversazioni

use crate::dtos::MessageDTO;
use crate::entities::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// L'altro partecipante di una conversazione, visto dalla lista DM
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ParticipantDTO {
    pub user_id: i32,
    pub username: String,
    pub full_name: String,
    pub profile_image_url: Option<String>,
    pub is_online: bool,
}

impl ParticipantDTO {
    pub fn from_user(user: &User, is_online: bool) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            full_name: user.display_name().to_string(),
            profile_image_url: user.profile_image_url.clone(),
            is_online,
        }
    }
}

/// Riga della lista conversazioni: controparte, ultimo messaggio, non letti
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConversationDTO {
    pub conversation_id: i32,
    pub other_user: ParticipantDTO,
    pub last_message: Option<MessageDTO>,
    pub unread_count: i64,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
