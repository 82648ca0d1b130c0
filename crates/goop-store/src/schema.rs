/// Store schema version. Bump when the system tables below change shape;
/// migrations re-apply idempotently on open (§4.A).
pub const SCHEMA_VERSION: i64 = 1;

pub const SYSTEM_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS _meta (
    key   TEXT PRIMARY KEY,
    value TEXT
);

CREATE TABLE IF NOT EXISTS _tables (
    name          TEXT PRIMARY KEY,
    schema        TEXT NOT NULL,
    insert_policy TEXT NOT NULL DEFAULT 'owner',
    created_at    TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS _peer_cache (
    peer_id        TEXT PRIMARY KEY,
    content        TEXT,
    email          TEXT,
    avatar_hash    TEXT,
    video_disabled INTEGER NOT NULL DEFAULT 0,
    active_template TEXT,
    verified       INTEGER NOT NULL DEFAULT 0,
    addrs          TEXT NOT NULL DEFAULT '[]',
    last_seen      TIMESTAMP
);

CREATE TABLE IF NOT EXISTS _favorites (
    peer_id        TEXT PRIMARY KEY,
    content        TEXT,
    email          TEXT,
    avatar_hash    TEXT,
    video_disabled INTEGER NOT NULL DEFAULT 0,
    active_template TEXT,
    verified       INTEGER NOT NULL DEFAULT 0,
    addrs          TEXT NOT NULL DEFAULT '[]',
    last_seen      TIMESTAMP
);

CREATE TABLE IF NOT EXISTS _groups (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    app_type    TEXT NOT NULL,
    max_members INTEGER NOT NULL DEFAULT 0,
    volatile    INTEGER NOT NULL DEFAULT 0,
    host_joined INTEGER NOT NULL DEFAULT 0,
    created_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS _group_subscriptions (
    host_peer_id  TEXT NOT NULL,
    group_id      TEXT NOT NULL,
    name          TEXT NOT NULL,
    app_type      TEXT NOT NULL,
    max_members   INTEGER NOT NULL DEFAULT 0,
    volatile      INTEGER NOT NULL DEFAULT 0,
    role          TEXT NOT NULL,
    subscribed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (host_peer_id, group_id)
);

CREATE TABLE IF NOT EXISTS _group_members (
    group_id TEXT NOT NULL,
    peer_id  TEXT NOT NULL,
    PRIMARY KEY (group_id, peer_id)
);
";

/// Open (or create) the Store's SQLite database and run migrations.
///
/// Mirrors the WAL + `user_version` migration pattern used elsewhere in
/// the corpus for embedded single-file stores: a schema is applied once
/// and re-checked idempotently on every open, never torn down and
/// rebuilt unless the version itself changes.
pub fn open_and_migrate(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current < SCHEMA_VERSION {
        conn.execute_batch(SYSTEM_SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
