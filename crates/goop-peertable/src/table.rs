use std::collections::HashMap;
use std::sync::RwLock;

use goop_transport::{now_ms, NodeId};

use crate::record::{PeerRecord, PeerUpdate};

/// A change produced by a Peer Table mutation. Consumed by upstream UIs
/// (out of scope) and the Group Manager, which routes invites off
/// `Upserted`/`Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    Upserted(NodeId),
    MarkedOffline(NodeId),
    Removed(NodeId),
    FavoriteChanged(NodeId),
}

/// In-memory map `identity -> PeerRecord`, protected by a single lock
/// with read-write separation (§4.B).
#[derive(Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<NodeId, PeerRecord>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert merges new fields but preserves `verified` unless the
    /// caller is the rendezvous path (`verified_by_directory`).
    pub fn upsert(&self, update: PeerUpdate, verified_by_directory: bool) -> PeerEvent {
        let id = update.identity;
        let mut peers = self.peers.write().unwrap();
        match peers.get_mut(&id) {
            Some(record) => record.merge(&update, verified_by_directory),
            None => {
                peers.insert(id, PeerRecord::new(&update, verified_by_directory));
            }
        }
        PeerEvent::Upserted(id)
    }

    /// Sets `offline_since = now` but keeps the record. `verified` is
    /// left untouched (§8 invariant).
    pub fn mark_offline(&self, id: NodeId) -> Option<PeerEvent> {
        let mut peers = self.peers.write().unwrap();
        let record = peers.get_mut(&id)?;
        record.reachable = false;
        if record.offline_since.is_none() {
            record.offline_since = Some(now_ms());
        }
        Some(PeerEvent::MarkedOffline(id))
    }

    /// Evicts a peer entirely. Used only when a user forgets a peer —
    /// never as a side effect of going offline.
    pub fn remove(&self, id: &NodeId) -> Option<PeerEvent> {
        let mut peers = self.peers.write().unwrap();
        peers.remove(id)?;
        Some(PeerEvent::Removed(*id))
    }

    pub fn get(&self, id: &NodeId) -> Option<PeerRecord> {
        self.peers.read().unwrap().get(id).cloned()
    }

    pub fn all(&self) -> Vec<PeerRecord> {
        self.peers.read().unwrap().values().cloned().collect()
    }

    pub fn set_favorite(&self, id: &NodeId, favorite: bool) -> Option<PeerEvent> {
        let mut peers = self.peers.write().unwrap();
        let record = peers.get_mut(id)?;
        record.favorite = favorite;
        Some(PeerEvent::FavoriteChanged(*id))
    }

    pub fn favorites(&self) -> Vec<PeerRecord> {
        self.peers
            .read()
            .unwrap()
            .values()
            .filter(|r| r.favorite)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn node_id(seed: u8) -> NodeId {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed as u64);
        let secret = iroh::SecretKey::generate(&mut rng);
        secret.public().to_string().parse().unwrap()
    }

    fn update(id: NodeId, content: &str) -> PeerUpdate {
        PeerUpdate {
            identity: id,
            content: content.to_string(),
            email: "a@example.com".to_string(),
            avatar_hash: String::new(),
            video_disabled: false,
            active_template: "default".to_string(),
            addrs: vec!["1.2.3.4:1".to_string()],
            last_seen: 1000,
        }
    }

    #[test]
    fn upsert_preserves_verified_unless_directory() {
        let table = PeerTable::new();
        let id = node_id(1);
        table.upsert(update(id, "hi"), true);
        assert!(table.get(&id).unwrap().verified);

        table.upsert(update(id, "hi again"), false);
        assert!(table.get(&id).unwrap().verified, "presence upsert must not clear verified");
    }

    #[test]
    fn mark_offline_keeps_record_and_verified() {
        let table = PeerTable::new();
        let id = node_id(1);
        table.upsert(update(id, "hi"), true);
        table.mark_offline(id);

        let record = table.get(&id).unwrap();
        assert!(!record.reachable);
        assert!(record.offline_since.is_some());
        assert!(record.verified);
    }

    #[test]
    fn online_update_clears_offline_since() {
        let table = PeerTable::new();
        let id = node_id(1);
        table.upsert(update(id, "hi"), false);
        table.mark_offline(id);
        assert!(table.get(&id).unwrap().offline_since.is_some());

        table.upsert(update(id, "back"), false);
        assert!(table.get(&id).unwrap().offline_since.is_none());
    }

    #[test]
    fn remove_evicts_entirely() {
        let table = PeerTable::new();
        let id = node_id(1);
        table.upsert(update(id, "hi"), false);
        table.remove(&id);
        assert!(table.get(&id).is_none());
    }

    #[test]
    fn favorites_independent_of_online_cache() {
        let table = PeerTable::new();
        let id = node_id(1);
        table.upsert(update(id, "hi"), false);
        table.set_favorite(&id, true);
        table.mark_offline(id);
        assert_eq!(table.favorites().len(), 1);
    }
}
