//! WebSocket Event DTOs - Data Transfer Objects per eventi WebSocket
//!
//! Tagged union per eventi WebSocket.
//! Serde serializza questo come:
//! { "type": "ReceiveMessage", "data": { ... } }
//! oppure
//! { "type": "UserOnline", "data": { ... } }
//! etc.

use crate::dtos::{EditMessageDTO, MessageDTO, OnlineStatusDTO, SendMessageDTO, TypingDTO};
use serde::{Deserialize, Serialize};

/// Eventi in uscita verso il client. Vengono condivisi tra le connessioni
/// tramite Arc, quindi la serializzazione avviene una volta per consegna
/// ma senza mai clonare il payload.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    ReceiveMessage(MessageDTO),
    NewMessageNotification(MessageDTO),
    MessageEdited(MessageDTO),
    MessageDeleted {
        message_id: i32,
        conversation_id: i32,
    },
    MessagesRead {
        conversation_id: i32,
        user_id: i32,
        message_ids: Vec<i32>,
    },
    UserTyping(TypingDTO),
    UserOnline(OnlineStatusDTO),
    UserOffline(OnlineStatusDTO),
    OnlineStatus(Vec<OnlineStatusDTO>),
    Error { code: u16, message: String },
}

/// Operazioni in ingresso dal client, stessa forma taggata degli eventi in uscita
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    SendMessage(SendMessageDTO),
    EditMessage(EditMessageDTO),
    DeleteMessage { message_id: i32 },
    MarkRead { conversation_id: i32 },
    Typing { conversation_id: i32, is_typing: bool },
    JoinConversation { conversation_id: i32 },
    GetOnlineStatus { user_ids: Vec<i32> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MessageType;

    #[test]
    fn client_event_parses_tagged_format() {
        let raw = r#"{"type":"SendMessage","data":{"receiver_id":2,"content":"hi","message_type":"Text","file_url":null}}"#;
        let event: ClientEvent = serde_json::from_str(raw).expect("valid tagged event");
        match event {
            ClientEvent::SendMessage(dto) => {
                assert_eq!(dto.receiver_id, 2);
                assert_eq!(dto.content, "hi");
                assert_eq!(dto.message_type, MessageType::Text);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn server_event_serializes_with_type_tag() {
        let event = ServerEvent::MessageDeleted {
            message_id: 7,
            conversation_id: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MessageDeleted");
        assert_eq!(json["data"]["message_id"], 7);
        assert_eq!(json["data"]["conversation_id"], 3);
    }

    #[test]
    fn online_status_broadcast_shape() {
        let event = ServerEvent::UserOnline(OnlineStatusDTO {
            user_id: 1,
            is_online: true,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "UserOnline");
        assert_eq!(json["data"]["is_online"], true);
    }
}
