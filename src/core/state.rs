//! Application State - Stato globale dell'applicazione
//!
//! Contiene tutti i repository, le strutture di presenza/gruppi e lo stato
//! condiviso necessario per gestire l'applicazione. Viene costruito una volta
//! dal service root e passato per riferimento (Arc) a tutti gli handler:
//! niente stato statico nascosto, ogni test può crearsi la propria istanza.

use crate::repositories::{
    ConversationRepository, MessageRepository, ParticipantRepository, ReadReceiptRepository,
    UserRepository,
};
use crate::ws::groups::GroupRegistry;
use crate::ws::locks::KeyedLocks;
use crate::ws::presence::PresenceRegistry;
use crate::ws::resolver::PairLocks;
use sqlx::MySqlPool;

/// Stato globale dell'applicazione condiviso tra tutte le route e middleware
pub struct AppState {
    /// Repository per la gestione degli utenti
    pub user: UserRepository,

    /// Repository per la gestione delle conversazioni
    pub conversations: ConversationRepository,

    /// Repository per la gestione dei partecipanti alle conversazioni
    pub participants: ParticipantRepository,

    /// Repository per la gestione dei messaggi
    pub msg: MessageRepository,

    /// Repository per le ricevute di lettura
    pub receipts: ReadReceiptRepository,

    /// Secret key per JWT token
    pub jwt_secret: String,

    /// Mappa bidirezionale utente <-> connessioni live con i canali di uscita
    pub presence: PresenceRegistry,

    /// Mappa conversazione -> connessioni iscritte, con indice inverso
    pub groups: GroupRegistry,

    /// Sezioni critiche per la find-or-create di conversazioni, una per coppia di utenti
    pub pair_locks: PairLocks,

    /// Serializzazione degli invii concorrenti nella stessa conversazione
    pub send_locks: KeyedLocks<i32>,
}

impl AppState {
    /// Crea una nuova istanza di AppState inizializzando tutti i repository
    /// con il pool di connessioni fornito e la JWT secret.
    pub fn new(pool: MySqlPool, jwt_secret: String) -> Self {
        Self {
            user: UserRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            participants: ParticipantRepository::new(pool.clone()),
            msg: MessageRepository::new(pool.clone()),
            receipts: ReadReceiptRepository::new(pool),
            jwt_secret,
            presence: PresenceRegistry::new(),
            groups: GroupRegistry::new(),
            pair_locks: PairLocks::new(),
            send_locks: KeyedLocks::new(),
        }
    }
}
