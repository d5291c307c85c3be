use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::models::ServerEvent;
use crate::ws::ClientTx;

struct PresenceEntry {
    user_id: Uuid,
    tx: ClientTx,
}

/// Process-wide index of live connections, keyed by connection id.
///
/// A pure routing structure: it answers "which live connections belong to
/// user X" for direct delivery, independent of room membership. Rebuilt
/// from nothing on restart. Injected where needed rather than living as a
/// module-level singleton.
pub struct PresenceIndex {
    entries: Mutex<HashMap<Uuid, PresenceEntry>>,
}

impl PresenceIndex {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, PresenceEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, connection_id: Uuid, user_id: Uuid, tx: ClientTx) {
        self.lock()
            .insert(connection_id, PresenceEntry { user_id, tx });
    }

    /// Forget a connection, returning the user it belonged to.
    pub fn unregister(&self, connection_id: Uuid) -> Option<Uuid> {
        self.lock().remove(&connection_id).map(|entry| entry.user_id)
    }

    pub fn connections_for(&self, user_id: Uuid) -> Vec<Uuid> {
        self.lock()
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(connection_id, _)| *connection_id)
            .collect()
    }

    /// Deliver an event to every live connection of a user. Returns how
    /// many connections it was queued for; connections whose writer has
    /// already shut down are skipped.
    pub fn send_to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let entries = self.lock();
        let mut delivered = 0;
        for entry in entries.values() {
            if entry.user_id == user_id && entry.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    pub fn user_count(&self) -> usize {
        self.lock()
            .values()
            .map(|entry| entry.user_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

impl Default for PresenceIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn routes_events_to_every_connection_of_a_user() {
        let index = PresenceIndex::new();
        let user = Uuid::new_v4();
        let other_user = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();

        index.register(Uuid::new_v4(), user, tx1);
        index.register(Uuid::new_v4(), user, tx2);
        index.register(Uuid::new_v4(), other_user, tx3);

        let delivered = index.send_to_user(user, &ServerEvent::error("ping"));
        assert_eq!(delivered, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let index = PresenceIndex::new();
        let user = Uuid::new_v4();
        let connection = Uuid::new_v4();

        let (tx, _rx) = mpsc::unbounded_channel();
        index.register(connection, user, tx);
        assert_eq!(index.connection_count(), 1);
        assert_eq!(index.connections_for(user), vec![connection]);

        assert_eq!(index.unregister(connection), Some(user));
        assert_eq!(index.connection_count(), 0);
        assert_eq!(index.send_to_user(user, &ServerEvent::error("gone")), 0);
    }

    #[tokio::test]
    async fn user_count_dedupes_multiple_connections() {
        let index = PresenceIndex::new();
        let user = Uuid::new_v4();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        index.register(Uuid::new_v4(), user, tx1);
        index.register(Uuid::new_v4(), user, tx2);

        assert_eq!(index.connection_count(), 2);
        assert_eq!(index.user_count(), 1);
    }
}
