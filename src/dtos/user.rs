//! User DTOs - Data Transfer Objects per utenti e stato di presenza

use crate::entities::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

// struct per gestire io col client
#[derive(Serialize, Deserialize, Debug)]
pub struct UserDTO {
    pub user_id: Option<i32>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl From<User> for UserDTO {
    fn from(value: User) -> Self {
        Self {
            user_id: Some(value.user_id),
            username: Some(value.username),
            full_name: value.full_name,
            profile_image_url: value.profile_image_url,
            password: None, // mai esposta al client!!!
        }
    }
}

/// DTO per registrare un nuovo utente (senza user_id)
#[derive(Serialize, Deserialize, Debug, Validate)]
pub struct CreateUserDTO {
    #[validate(length(min = 3, max = 32, message = "Username must be between 3 and 32 characters"))]
    pub username: String,

    #[validate(length(min = 8, max = 72, message = "Password must be between 8 and 72 characters"))]
    pub password: String,

    pub full_name: Option<String>,
}

/// DTO per il login (solo username e password)
#[derive(Serialize, Deserialize, Debug)]
pub struct LoginDTO {
    pub username: String,
    pub password: String,
}

/// Stato di presenza di un singolo utente, usato sia come broadcast
/// (UserOnline/UserOffline) sia come risposta a GetOnlineStatus
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OnlineStatusDTO {
    pub user_id: i32,
    pub is_online: bool,
}

/// Indicatore di digitazione, effimero: non viene mai persistito
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TypingDTO {
    pub conversation_id: i32,
    pub user_id: i32,
    pub username: String,
    pub is_typing: bool,
}
