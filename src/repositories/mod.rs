//! Repositories module - Coordinatore per tutti i repository del progetto
//!
//! Questo modulo organizza i repository in sotto-moduli separati per una migliore manutenibilità.
//! Ogni repository gestisce le operazioni di database per una specifica entità.
//!
//! Le query sono tutte esplicite e "flat": niente caricamento lazy di grafi di
//! oggetti, ogni metodo ritorna righe già joinate pronte per il dispatcher.
//! Si usa la variante runtime `query_as::<_, T>` (con `FromRow` sulle entity)
//! al posto della macro compile-time, che richiederebbe lo schema raggiungibile
//! in fase di build.

pub mod conversation;
pub mod message;
pub mod participant;
pub mod read_receipt;
pub mod traits;
pub mod user;

// Re-esportazione dei trait per facilitare l'import
pub use traits::{Create, Read};

// Re-esportazione delle struct dei repository per facilitare l'import
pub use conversation::ConversationRepository;
pub use message::MessageRepository;
pub use participant::ParticipantRepository;
pub use read_receipt::ReadReceiptRepository;
pub use user::UserRepository;
