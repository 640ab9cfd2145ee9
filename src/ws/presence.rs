//! Presence Registry - mappa bidirezionale utente <-> connessioni live
//!
//! Un utente è "online" se ha almeno una connessione registrata. Ogni
//! connessione è identificata da un ConnId opaco e possiede un canale di
//! uscita bounded: il registro non tocca mai il socket, consegna solo sul
//! canale e non blocca mai (try_send). Una consegna verso una connessione
//! ormai morta viene loggata e saltata, mai propagata al chiamante.

use crate::dtos::ServerEvent;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, instrument, warn};

/// Identificatore opaco di una connessione transport-level, unico per processo
pub type ConnId = u64;

/// Esito della consegna di un evento su una singola connessione
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Evento accodato sul canale di uscita della connessione
    Sent,
    /// Coda di uscita piena: evento scartato, il client recupera lo stato alla riconnessione
    Dropped,
    /// La connessione non esiste più (handle sconosciuto o canale chiuso)
    Gone,
}

struct ConnectionEntry {
    user_id: i32,
    tx: Sender<Arc<ServerEvent>>,
}

pub struct PresenceRegistry {
    /// user_id -> insieme delle sue connessioni live.
    /// Invariante: una chiave esiste se e solo se l'insieme non è vuoto.
    users: DashMap<i32, HashSet<ConnId>>,

    /// Indice inverso: conn_id -> proprietario e canale di uscita
    connections: DashMap<ConnId, ConnectionEntry>,

    next_conn_id: AtomicU64,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        PresenceRegistry {
            users: DashMap::new(),
            connections: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Alloca un nuovo handle di connessione, mai riusato nel processo
    pub fn next_handle(&self) -> ConnId {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registra una connessione per l'utente. Idempotente sulla stessa coppia
    /// (user_id, conn_id): l'insieme non contiene duplicati.
    ///
    /// Ritorna `true` se questa è la prima connessione dell'utente (prima era
    /// offline), così il chiamante può emettere il broadcast "user online".
    #[instrument(skip(self, tx), fields(user_id, conn_id))]
    pub fn register(&self, user_id: i32, conn_id: ConnId, tx: Sender<Arc<ServerEvent>>) -> bool {
        self.connections.insert(conn_id, ConnectionEntry { user_id, tx });

        // l'entry lock serializza register/unregister concorrenti sullo stesso utente
        let mut entry = self.users.entry(user_id).or_default();
        let was_offline = entry.is_empty();
        entry.insert(conn_id);

        info!(
            connections = entry.len(),
            was_offline, "Connection registered for user"
        );
        was_offline
    }

    /// Rimuove la connessione da qualunque utente la possieda.
    ///
    /// Ritorna `Some(user_id)` se era l'ultima connessione dell'utente (l'entry
    /// viene eliminata, il chiamante emette "user offline"), `None` se l'utente
    /// ha altre connessioni o se l'handle era già sconosciuto.
    #[instrument(skip(self), fields(conn_id))]
    pub fn unregister(&self, conn_id: ConnId) -> Option<i32> {
        let (_, entry) = self.connections.remove(&conn_id)?;

        let mut last_connection = false;
        if let Entry::Occupied(mut occupied) = self.users.entry(entry.user_id) {
            occupied.get_mut().remove(&conn_id);
            if occupied.get().is_empty() {
                occupied.remove();
                last_connection = true;
            }
        }

        info!(user_id = entry.user_id, last_connection, "Connection unregistered");
        last_connection.then_some(entry.user_id)
    }

    /// True se l'utente ha almeno una connessione live
    pub fn is_online(&self, user_id: &i32) -> bool {
        self.users.contains_key(user_id)
    }

    /// Snapshot delle connessioni di un utente, per il push multi-dispositivo
    pub fn connections_for(&self, user_id: &i32) -> Vec<ConnId> {
        self.users
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Get the count of online users
    pub fn online_count(&self) -> usize {
        self.users.len()
    }

    /// Consegna non bloccante di un evento a una singola connessione.
    /// Coda piena = evento scartato con warn (il peer lento non deve mai
    /// rallentare il loop di broadcast); canale chiuso = connessione sparita.
    pub fn deliver(&self, conn_id: ConnId, event: Arc<ServerEvent>) -> Delivery {
        let Some(entry) = self.connections.get(&conn_id) else {
            return Delivery::Gone;
        };

        match entry.tx.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                warn!(conn_id, "Outbound queue full, event dropped");
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Gone,
        }
    }

    /// Consegna l'evento a tutte le connessioni di un utente (canale personale).
    /// Zero connessioni live = no-op senza errore.
    #[instrument(skip(self, event), fields(user_id))]
    pub fn send_to_user(&self, user_id: &i32, event: Arc<ServerEvent>) -> usize {
        let mut sent = 0;
        for conn_id in self.connections_for(user_id) {
            if self.deliver(conn_id, event.clone()) == Delivery::Sent {
                sent += 1;
            }
        }
        sent
    }

    /// Consegna l'evento a ogni connessione live del processo
    /// (usato per UserOnline/UserOffline, come il Clients.All dell'hub)
    #[instrument(skip(self, event))]
    pub fn broadcast_all(&self, event: Arc<ServerEvent>) -> usize {
        let targets: Vec<ConnId> = self.connections.iter().map(|e| *e.key()).collect();

        let mut sent = 0;
        for conn_id in targets {
            if self.deliver(conn_id, event.clone()) == Delivery::Sent {
                sent += 1;
            }
        }
        info!(receivers = sent, "Event broadcast to all connections");
        sent
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::OnlineStatusDTO;
    use tokio::sync::mpsc;

    fn online_event(user_id: i32) -> Arc<ServerEvent> {
        Arc::new(ServerEvent::UserOnline(OnlineStatusDTO {
            user_id,
            is_online: true,
        }))
    }

    #[tokio::test]
    async fn is_online_tracks_register_unregister_balance() {
        let registry = PresenceRegistry::new();
        let user_id = 1;

        assert!(!registry.is_online(&user_id));

        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);
        let c1 = registry.next_handle();
        let c2 = registry.next_handle();

        assert!(registry.register(user_id, c1, tx1), "first connection marks user online");
        assert!(!registry.register(user_id, c2, tx2), "second connection is not a transition");
        assert!(registry.is_online(&user_id));

        assert_eq!(registry.unregister(c1), None, "one connection still open");
        assert!(registry.is_online(&user_id));

        assert_eq!(registry.unregister(c2), Some(user_id), "last close reports the owner");
        assert!(!registry.is_online(&user_id));
        assert_eq!(registry.online_count(), 0);
    }

    #[tokio::test]
    async fn register_is_idempotent_on_same_pair() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let conn = registry.next_handle();

        registry.register(5, conn, tx.clone());
        registry.register(5, conn, tx);

        assert_eq!(registry.connections_for(&5).len(), 1, "no duplicate handles in the set");
        assert_eq!(registry.unregister(conn), Some(5));
    }

    #[tokio::test]
    async fn unregister_unknown_handle_returns_none() {
        let registry = PresenceRegistry::new();
        assert_eq!(registry.unregister(999), None);
    }

    #[tokio::test]
    async fn deliver_to_closed_channel_reports_gone() {
        let registry = PresenceRegistry::new();
        let (tx, rx) = mpsc::channel(8);
        let conn = registry.next_handle();
        registry.register(7, conn, tx);

        drop(rx); // il peer è sparito senza unregister

        assert_eq!(registry.deliver(conn, online_event(7)), Delivery::Gone);
    }

    #[tokio::test]
    async fn full_queue_drops_event_without_blocking() {
        let registry = PresenceRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let conn = registry.next_handle();
        registry.register(7, conn, tx);

        assert_eq!(registry.deliver(conn, online_event(7)), Delivery::Sent);
        assert_eq!(registry.deliver(conn, online_event(7)), Delivery::Dropped);

        // il primo evento è ancora in coda
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn send_to_user_reaches_every_device() {
        let registry = PresenceRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let c1 = registry.next_handle();
        let c2 = registry.next_handle();
        registry.register(3, c1, tx1);
        registry.register(3, c2, tx2);

        assert_eq!(registry.send_to_user(&3, online_event(3)), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_offline_user_is_a_noop() {
        let registry = PresenceRegistry::new();
        assert_eq!(registry.send_to_user(&42, online_event(42)), 0);
    }
}
