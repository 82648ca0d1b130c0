//! Embedded per-peer relational store.
//!
//! One SQLite file per node holds system metadata (table registry, peer
//! caches, group records, subscriptions) and every user-defined table
//! created over the data protocol. All access funnels through [`Store`],
//! which owns identifier validation, owner stamping, and the bounded
//! read-only SQL surface exposed to Lua.

mod error;
mod group;
mod ident;
mod peer_cache;
mod schema;
mod store;
mod value;

pub use error::{StoreError, StoreResult};
pub use group::{GroupRecord, GroupSubscription};
pub use ident::validate_identifier;
pub use peer_cache::CachedPeer;
pub use store::{
    ColumnDef, InsertPolicy, SelectQuery, Store, TableInfo, LUA_QUERY_BYTE_CAP, LUA_QUERY_ROW_CAP,
};
pub use value::{normalize_timestamp, Row};
