//! Keyed Locks - sezioni critiche effimere indicizzate per chiave
//!
//! Una entry esiste solo finché qualcuno tiene o aspetta il lock per quella
//! chiave: la guard, alla drop, rimuove l'entry se non ci sono altri waiter.
//! La mappa quindi non accumula una entry per ogni chiave mai toccata nel
//! corso del processo.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct KeyedLocks<K: Eq + Hash + Copy> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    pub fn new() -> Self {
        KeyedLocks {
            locks: DashMap::new(),
        }
    }

    /// Acquisisce la sezione critica per la chiave, creandola se assente.
    /// Rilasciare la guard libera il mutex e, se nessun altro task sta
    /// aspettando la stessa chiave, elimina l'entry dalla mappa.
    pub async fn lock(&self, key: K) -> KeyedLockGuard<'_, K> {
        let mutex = self.locks.entry(key).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyedLockGuard {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }
}

impl<K: Eq + Hash + Copy> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct KeyedLockGuard<'a, K: Eq + Hash + Copy> {
    locks: &'a DashMap<K, Arc<Mutex<()>>>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Copy> Drop for KeyedLockGuard<'_, K> {
    fn drop(&mut self) {
        // prima va rilasciata la Arc tenuta dalla guard, poi si guarda il
        // conteggio sotto l'entry lock: 1 = nessun waiter in coda
        self.guard.take();
        if let Entry::Occupied(entry) = self.locks.entry(self.key) {
            if Arc::strong_count(entry.get()) == 1 {
                entry.remove();
            }
        }
    }
}
