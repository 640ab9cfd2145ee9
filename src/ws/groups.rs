//! Group Membership Manager - mappa conversazione -> connessioni iscritte
//!
//! Le membership NON sono persistite: vengono ricostruite da zero dallo
//! storage a ogni connessione. L'indice inverso (conn_id -> conversazioni)
//! rende la leave su disconnessione O(gruppi dell'utente) invece di una
//! scansione completa.
//!
//! Il broadcast fotografa l'insieme dei membri sotto lock, rilascia il lock e
//! solo dopo esegue le consegne: nessuna operazione di rete avviene mai con un
//! lock del registro in mano.

use crate::dtos::ServerEvent;
use crate::ws::presence::{ConnId, Delivery, PresenceRegistry};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct GroupRegistry {
    /// conversation_id -> connessioni attualmente iscritte
    groups: DashMap<i32, HashSet<ConnId>>,

    /// Indice inverso: conn_id -> conversazioni a cui è iscritta
    memberships: DashMap<ConnId, HashSet<i32>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        GroupRegistry {
            groups: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Iscrive la connessione al gruppo della conversazione. Idempotente.
    #[instrument(skip(self), fields(conversation_id, conn_id))]
    pub fn join(&self, conversation_id: &i32, conn_id: ConnId) {
        self.groups
            .entry(*conversation_id)
            .or_default()
            .insert(conn_id);
        self.memberships
            .entry(conn_id)
            .or_default()
            .insert(*conversation_id);
    }

    /// Rimuove la connessione dal solo gruppo indicato, per quando un utente
    /// abbandona una conversazione restando connesso
    #[instrument(skip(self), fields(conversation_id, conn_id))]
    pub fn leave_conversation(&self, conversation_id: &i32, conn_id: ConnId) {
        if let Some(mut members) = self.groups.get_mut(conversation_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                drop(members);
                self.groups.remove(conversation_id);
            }
        }
        if let Some(mut conversations) = self.memberships.get_mut(&conn_id) {
            conversations.remove(conversation_id);
            if conversations.is_empty() {
                drop(conversations);
                self.memberships.remove(&conn_id);
            }
        }
    }

    /// Rimuove la connessione da ogni gruppo a cui appartiene,
    /// chiamata alla disconnessione
    #[instrument(skip(self), fields(conn_id))]
    pub fn leave(&self, conn_id: ConnId) {
        let Some((_, conversation_ids)) = self.memberships.remove(&conn_id) else {
            return;
        };

        for conversation_id in conversation_ids {
            if let Some(mut members) = self.groups.get_mut(&conversation_id) {
                members.remove(&conn_id);
                if members.is_empty() {
                    drop(members);
                    self.groups.remove(&conversation_id);
                }
            }
        }
        info!("Connection removed from all groups");
    }

    /// Snapshot dei membri correnti del gruppo (il lock viene rilasciato subito)
    pub fn members(&self, conversation_id: &i32) -> Vec<ConnId> {
        self.groups
            .get(conversation_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Consegna l'evento a ogni connessione del gruppo
    pub fn broadcast(
        &self,
        presence: &PresenceRegistry,
        conversation_id: &i32,
        event: Arc<ServerEvent>,
    ) -> usize {
        self.broadcast_filtered(presence, conversation_id, &HashSet::new(), event)
    }

    /// Consegna l'evento a ogni connessione del gruppo TRANNE quella
    /// chiamante: gli altri dispositivi dello stesso utente lo ricevono
    pub fn broadcast_except_conn(
        &self,
        presence: &PresenceRegistry,
        conversation_id: &i32,
        excluded_conn: ConnId,
        event: Arc<ServerEvent>,
    ) -> usize {
        let excluded = HashSet::from([excluded_conn]);
        self.broadcast_filtered(presence, conversation_id, &excluded, event)
    }

    /// Consegna l'evento a ogni connessione del gruppo TRANNE quelle di un
    /// utente (tutte: multi-dispositivo), per evitare l'eco verso chi ha
    /// generato l'evento (mark read)
    pub fn broadcast_except_user(
        &self,
        presence: &PresenceRegistry,
        conversation_id: &i32,
        excluded_user: &i32,
        event: Arc<ServerEvent>,
    ) -> usize {
        let excluded: HashSet<ConnId> = presence.connections_for(excluded_user).into_iter().collect();
        self.broadcast_filtered(presence, conversation_id, &excluded, event)
    }

    /// Loop di consegna comune: una connessione morta viene loggata, rimossa
    /// dai gruppi e saltata, senza mai interrompere le consegne rimanenti
    #[instrument(skip(self, presence, event, excluded), fields(conversation_id))]
    fn broadcast_filtered(
        &self,
        presence: &PresenceRegistry,
        conversation_id: &i32,
        excluded: &HashSet<ConnId>,
        event: Arc<ServerEvent>,
    ) -> usize {
        let snapshot = self.members(conversation_id);
        let total = snapshot.len();

        let mut sent = 0;
        for conn_id in snapshot {
            if excluded.contains(&conn_id) {
                continue;
            }
            match presence.deliver(conn_id, event.clone()) {
                Delivery::Sent => sent += 1,
                Delivery::Dropped => {}
                Delivery::Gone => {
                    warn!(conn_id, "Member connection gone, pruning from groups");
                    self.leave(conn_id);
                }
            }
        }

        info!(receivers = sent, members = total, "Event broadcast to group");
        sent
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
