//! Persistence for group records, subscriptions, and member lists (§3,
//! §4.H). Like `peer_cache.rs`, these are fixed-shape system tables
//! addressed directly rather than through the dynamic table registry.

use rusqlite::OptionalExtension;

use crate::error::StoreResult;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    pub app_type: String,
    pub max_members: i64,
    pub volatile: bool,
    pub host_joined: bool,
}

/// A persisted subscription to a group hosted elsewhere (§3 Subscription).
/// Liveness (whether the member stream is currently up) is runtime state
/// the Group Manager tracks in memory, not part of this record — a
/// subscription surviving disconnection is exactly what makes rejoin
/// possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSubscription {
    pub host_peer_id: String,
    pub group_id: String,
    pub name: String,
    pub app_type: String,
    pub max_members: i64,
    pub volatile: bool,
    pub role: String,
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        app_type: row.get(2)?,
        max_members: row.get(3)?,
        volatile: row.get::<_, i64>(4)? != 0,
        host_joined: row.get::<_, i64>(5)? != 0,
    })
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupSubscription> {
    Ok(GroupSubscription {
        host_peer_id: row.get(0)?,
        group_id: row.get(1)?,
        name: row.get(2)?,
        app_type: row.get(3)?,
        max_members: row.get(4)?,
        volatile: row.get::<_, i64>(5)? != 0,
        role: row.get(6)?,
    })
}

impl Store {
    /// Insert or replace a group record the local node hosts.
    pub fn upsert_group(&self, group: &GroupRecord) -> StoreResult<()> {
        let conn = self.raw_conn();
        conn.execute(
            "INSERT INTO _groups (id, name, app_type, max_members, volatile, host_joined) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET \
                name=excluded.name, app_type=excluded.app_type, max_members=excluded.max_members, \
                volatile=excluded.volatile, host_joined=excluded.host_joined",
            rusqlite::params![
                group.id,
                group.name,
                group.app_type,
                group.max_members,
                group.volatile as i64,
                group.host_joined as i64,
            ],
        )?;
        Ok(())
    }

    pub fn group(&self, group_id: &str) -> StoreResult<Option<GroupRecord>> {
        let conn = self.raw_conn();
        let row = conn
            .query_row(
                "SELECT id, name, app_type, max_members, volatile, host_joined FROM _groups WHERE id = ?1",
                [group_id],
                row_to_group,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_groups(&self) -> StoreResult<Vec<GroupRecord>> {
        let conn = self.raw_conn();
        let mut stmt =
            conn.prepare("SELECT id, name, app_type, max_members, volatile, host_joined FROM _groups")?;
        let rows = stmt
            .query_map([], row_to_group)?
            .filter_map(Result::ok)
            .collect();
        Ok(rows)
    }

    /// Drop a hosted group's record and member list (§4.H close, volatile
    /// groups).
    pub fn delete_group(&self, group_id: &str) -> StoreResult<()> {
        let conn = self.raw_conn();
        conn.execute("DELETE FROM _group_members WHERE group_id = ?1", [group_id])?;
        conn.execute("DELETE FROM _groups WHERE id = ?1", [group_id])?;
        Ok(())
    }

    pub fn set_group_members(&self, group_id: &str, members: &[String]) -> StoreResult<()> {
        let conn = self.raw_conn();
        conn.execute("DELETE FROM _group_members WHERE group_id = ?1", [group_id])?;
        for peer_id in members {
            conn.execute(
                "INSERT OR IGNORE INTO _group_members (group_id, peer_id) VALUES (?1, ?2)",
                rusqlite::params![group_id, peer_id],
            )?;
        }
        Ok(())
    }

    pub fn group_members(&self, group_id: &str) -> StoreResult<Vec<String>> {
        let conn = self.raw_conn();
        let mut stmt = conn.prepare("SELECT peer_id FROM _group_members WHERE group_id = ?1")?;
        let rows = stmt
            .query_map([group_id], |row| row.get(0))?
            .filter_map(Result::ok)
            .collect();
        Ok(rows)
    }

    pub fn is_group_member(&self, group_id: &str, peer_id: &str) -> StoreResult<bool> {
        let conn = self.raw_conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM _group_members WHERE group_id = ?1 AND peer_id = ?2",
                rusqlite::params![group_id, peer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert or replace a subscription to a group hosted elsewhere
    /// (§4.H member responsibilities, §3 Subscription).
    pub fn upsert_subscription(&self, sub: &GroupSubscription) -> StoreResult<()> {
        let conn = self.raw_conn();
        conn.execute(
            "INSERT INTO _group_subscriptions \
                (host_peer_id, group_id, name, app_type, max_members, volatile, role) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(host_peer_id, group_id) DO UPDATE SET \
                name=excluded.name, app_type=excluded.app_type, max_members=excluded.max_members, \
                volatile=excluded.volatile, role=excluded.role",
            rusqlite::params![
                sub.host_peer_id,
                sub.group_id,
                sub.name,
                sub.app_type,
                sub.max_members,
                sub.volatile as i64,
                sub.role,
            ],
        )?;
        Ok(())
    }

    pub fn subscription(&self, host_peer_id: &str, group_id: &str) -> StoreResult<Option<GroupSubscription>> {
        let conn = self.raw_conn();
        let row = conn
            .query_row(
                "SELECT host_peer_id, group_id, name, app_type, max_members, volatile, role \
                 FROM _group_subscriptions WHERE host_peer_id = ?1 AND group_id = ?2",
                rusqlite::params![host_peer_id, group_id],
                row_to_subscription,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_subscriptions(&self) -> StoreResult<Vec<GroupSubscription>> {
        let conn = self.raw_conn();
        let mut stmt = conn.prepare(
            "SELECT host_peer_id, group_id, name, app_type, max_members, volatile, role \
             FROM _group_subscriptions",
        )?;
        let rows = stmt
            .query_map([], row_to_subscription)?
            .filter_map(Result::ok)
            .collect();
        Ok(rows)
    }

    pub fn delete_subscription(&self, host_peer_id: &str, group_id: &str) -> StoreResult<()> {
        let conn = self.raw_conn();
        conn.execute(
            "DELETE FROM _group_subscriptions WHERE host_peer_id = ?1 AND group_id = ?2",
            rusqlite::params![host_peer_id, group_id],
        )?;
        Ok(())
    }

    /// Drop any subscription or hosted record whose group id starts with
    /// `rt-` (stale realtime channels, purged on node start — §3 Channel,
    /// EXPANSION D.6).
    pub fn purge_stale_realtime_groups(&self) -> StoreResult<usize> {
        let conn = self.raw_conn();
        let mut removed = conn.execute("DELETE FROM _groups WHERE id LIKE 'rt-%'", [])?;
        removed += conn.execute("DELETE FROM _group_members WHERE group_id LIKE 'rt-%'", [])?;
        removed += conn.execute(
            "DELETE FROM _group_subscriptions WHERE group_id LIKE 'rt-%'",
            [],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str) -> GroupRecord {
        GroupRecord {
            id: id.to_string(),
            name: "Test Group".to_string(),
            app_type: "chat".to_string(),
            max_members: 0,
            volatile: false,
            host_joined: true,
        }
    }

    #[test]
    fn group_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_group(&group("grp-1")).unwrap();
        let fetched = store.group("grp-1").unwrap().unwrap();
        assert_eq!(fetched.name, "Test Group");
        assert!(fetched.host_joined);
    }

    #[test]
    fn group_members_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_group(&group("grp-1")).unwrap();
        store
            .set_group_members("grp-1", &["alice".into(), "bob".into()])
            .unwrap();
        let members = store.group_members("grp-1").unwrap();
        assert_eq!(members.len(), 2);
        assert!(store.is_group_member("grp-1", "alice").unwrap());
        assert!(!store.is_group_member("grp-1", "carol").unwrap());
    }

    #[test]
    fn delete_group_cascades_members() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_group(&group("grp-1")).unwrap();
        store.set_group_members("grp-1", &["alice".into()]).unwrap();
        store.delete_group("grp-1").unwrap();
        assert!(store.group("grp-1").unwrap().is_none());
        assert!(store.group_members("grp-1").unwrap().is_empty());
    }

    #[test]
    fn subscription_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let sub = GroupSubscription {
            host_peer_id: "host-1".into(),
            group_id: "grp-1".into(),
            name: "Test".into(),
            app_type: "chat".into(),
            max_members: 0,
            volatile: false,
            role: "member".into(),
        };
        store.upsert_subscription(&sub).unwrap();
        let fetched = store.subscription("host-1", "grp-1").unwrap().unwrap();
        assert_eq!(fetched.role, "member");
        assert_eq!(fetched.name, "Test");
    }

    #[test]
    fn purge_stale_realtime_groups_only_touches_rt_prefix() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_group(&group("grp-1")).unwrap();
        store.upsert_group(&group("rt-abcdef")).unwrap();
        store.set_group_members("rt-abcdef", &["alice".into()]).unwrap();

        let removed = store.purge_stale_realtime_groups().unwrap();
        assert!(removed > 0);
        assert!(store.group("grp-1").unwrap().is_some());
        assert!(store.group("rt-abcdef").unwrap().is_none());
    }
}
