//! DTOs module - Data Transfer Objects
//!
//! Questo modulo contiene tutti i DTOs usati per la comunicazione client-server.
//! I DTOs separano la rappresentazione esterna (API) dalla rappresentazione interna (entities).

pub mod conversation;
pub mod events;
pub mod message;
pub mod query;
pub mod user;

// Re-exports per mantenere gli import compatti
pub use conversation::{ConversationDTO, ParticipantDTO};
pub use events::{ClientEvent, ServerEvent};
pub use message::{CreateMessageDTO, EditMessageDTO, MessageDTO, SendMessageDTO};
pub use query::{MessagesQuery, UserSearchQuery};
pub use user::{CreateUserDTO, LoginDTO, OnlineStatusDTO, TypingDTO, UserDTO};
