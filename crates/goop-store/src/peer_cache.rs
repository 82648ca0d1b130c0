//! Persistence for the two `CachedPeer` storage slots described in §3/§6:
//! an online cache (overwritten freely) and a favorites table (updated
//! only when the corresponding peer is seen online). Reads prefer the
//! online cache, falling back to favorites.
//!
//! These are system tables with a fixed shape, not user tables — they
//! bypass the dynamic registry in `store.rs` and are addressed directly.

use rusqlite::OptionalExtension;
use serde_json::Value as Json;

use crate::error::StoreResult;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct CachedPeer {
    pub peer_id: String,
    pub content: String,
    pub email: String,
    pub avatar_hash: String,
    pub video_disabled: bool,
    pub active_template: String,
    pub verified: bool,
    pub addrs: Vec<String>,
    pub last_seen: Option<String>,
}

fn row_to_cached_peer(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedPeer> {
    let addrs_json: String = row.get(6)?;
    let addrs: Vec<String> = serde_json::from_str::<Json>(&addrs_json)
        .ok()
        .and_then(|v| v.as_array().map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect()))
        .unwrap_or_default();
    Ok(CachedPeer {
        peer_id: row.get(0)?,
        content: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        email: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        avatar_hash: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        video_disabled: row.get::<_, i64>(4)? != 0,
        active_template: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        verified: row.get::<_, i64>(7)? != 0,
        addrs,
        last_seen: row.get(8)?,
    })
}

impl Store {
    fn upsert_cached_peer(&self, table: &str, peer: &CachedPeer) -> StoreResult<()> {
        let conn = self.raw_conn();
        let addrs_json = serde_json::to_string(&peer.addrs).unwrap_or_default();
        conn.execute(
            &format!(
                "INSERT INTO {table} \
                    (peer_id, content, email, avatar_hash, video_disabled, active_template, addrs, verified, last_seen) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP) \
                 ON CONFLICT(peer_id) DO UPDATE SET \
                    content=excluded.content, email=excluded.email, avatar_hash=excluded.avatar_hash, \
                    video_disabled=excluded.video_disabled, active_template=excluded.active_template, \
                    addrs=excluded.addrs, verified=excluded.verified, last_seen=excluded.last_seen"
            ),
            rusqlite::params![
                peer.peer_id,
                peer.content,
                peer.email,
                peer.avatar_hash,
                peer.video_disabled as i64,
                peer.active_template,
                addrs_json,
                peer.verified as i64,
            ],
        )?;
        Ok(())
    }

    fn cached_peer(&self, table: &str, peer_id: &str) -> StoreResult<Option<CachedPeer>> {
        let conn = self.raw_conn();
        let row = conn
            .query_row(
                &format!(
                    "SELECT peer_id, content, email, avatar_hash, video_disabled, active_template, addrs, verified, last_seen \
                     FROM {table} WHERE peer_id = ?1"
                ),
                [peer_id],
                row_to_cached_peer,
            )
            .optional()?;
        Ok(row)
    }

    /// Overwrite the online-cache entry for `peer_id` (freely replaced on
    /// every presence upsert).
    pub fn upsert_online_cache(&self, peer: &CachedPeer) -> StoreResult<()> {
        self.upsert_cached_peer("_peer_cache", peer)
    }

    pub fn online_cached_peer(&self, peer_id: &str) -> StoreResult<Option<CachedPeer>> {
        self.cached_peer("_peer_cache", peer_id)
    }

    /// Update the favorites slot. Callers are expected to only invoke
    /// this when the peer is known to be online — favorites persist
    /// independently of the online cache otherwise (§3).
    pub fn upsert_favorite(&self, peer: &CachedPeer) -> StoreResult<()> {
        self.upsert_cached_peer("_favorites", peer)
    }

    pub fn favorite_peer(&self, peer_id: &str) -> StoreResult<Option<CachedPeer>> {
        self.cached_peer("_favorites", peer_id)
    }

    pub fn remove_favorite(&self, peer_id: &str) -> StoreResult<()> {
        let conn = self.raw_conn();
        conn.execute("DELETE FROM _favorites WHERE peer_id = ?1", [peer_id])?;
        Ok(())
    }

    pub fn list_favorites(&self) -> StoreResult<Vec<CachedPeer>> {
        let conn = self.raw_conn();
        let mut stmt = conn.prepare(
            "SELECT peer_id, content, email, avatar_hash, video_disabled, active_template, addrs, verified, last_seen \
             FROM _favorites",
        )?;
        let rows = stmt
            .query_map([], row_to_cached_peer)?
            .filter_map(Result::ok)
            .collect();
        Ok(rows)
    }

    /// Read preferring the online cache, falling back to favorites (§3
    /// `CachedPeer` read rule).
    pub fn cached_peer_preferring_online(&self, peer_id: &str) -> StoreResult<Option<CachedPeer>> {
        if let Some(peer) = self.online_cached_peer(peer_id)? {
            return Ok(Some(peer));
        }
        self.favorite_peer(peer_id)
    }
}
