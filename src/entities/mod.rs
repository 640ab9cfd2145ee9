//! Entities module - Entità del dominio applicativo
//!
//! Questo modulo contiene tutte le entità (models) che rappresentano i dati persistiti nel database.
//! Ogni entity corrisponde a una tabella nel database.

pub mod conversation;
pub mod enums;
pub mod message;
pub mod participant;
pub mod user;

// Re-exports per facilitare l'import
pub use conversation::Conversation;
pub use enums::MessageType;
pub use message::Message;
pub use participant::ConversationParticipant;
pub use user::User;
