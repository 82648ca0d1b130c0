use std::sync::Arc;

use goop_store::{CachedPeer, Store, StoreResult};
use goop_transport::{now_ms, NodeId};

use crate::record::{PeerRecord, PeerUpdate};
use crate::table::PeerTable;

/// Bridges the in-memory [`PeerTable`] to the two persisted `CachedPeer`
/// slots in the Store: an online cache overwritten on every presence
/// upsert, and a favorites table updated only while the peer is online.
pub struct PeerCache {
    store: Arc<Store>,
}

impl PeerCache {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persist `record` to the online cache. Also refreshes the
    /// favorites slot if the peer is marked favorite, since that slot is
    /// only ever updated while the peer is known to be online (§3).
    pub fn persist_online(&self, record: &PeerRecord) -> StoreResult<()> {
        let cached = to_cached_peer(record);
        self.store.upsert_online_cache(&cached)?;
        if record.favorite {
            self.store.upsert_favorite(&cached)?;
        }
        Ok(())
    }

    pub fn set_favorite(&self, record: &PeerRecord, favorite: bool) -> StoreResult<()> {
        if favorite {
            self.store.upsert_favorite(&to_cached_peer(record))
        } else {
            self.store.remove_favorite(&record.identity.to_string())
        }
    }

    /// Load persisted favorites back into a freshly created `PeerTable`
    /// on node start. Entries whose peer id no longer parses are skipped
    /// rather than failing the whole load.
    pub fn load_favorites_into(&self, table: &PeerTable) -> StoreResult<()> {
        for favorite in self.store.list_favorites()? {
            let Ok(identity) = favorite.peer_id.parse::<NodeId>() else {
                tracing::warn!(peer_id = %favorite.peer_id, "dropping favorite with unparseable peer id");
                continue;
            };
            let update = PeerUpdate {
                identity,
                content: favorite.content.clone(),
                email: favorite.email.clone(),
                avatar_hash: favorite.avatar_hash.clone(),
                video_disabled: favorite.video_disabled,
                active_template: favorite.active_template.clone(),
                addrs: favorite.addrs.clone(),
                last_seen: now_ms(),
            };
            table.upsert(update, favorite.verified);
            table.set_favorite(&identity, true);
            table.mark_offline(identity);
        }
        Ok(())
    }
}

fn to_cached_peer(record: &PeerRecord) -> CachedPeer {
    CachedPeer {
        peer_id: record.identity.to_string(),
        content: record.content.clone(),
        email: record.email.clone(),
        avatar_hash: record.avatar_hash.clone(),
        video_disabled: record.video_disabled,
        active_template: record.active_template.clone(),
        verified: record.verified,
        addrs: record.addrs.clone(),
        last_seen: None,
    }
}
