use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value as Json;

use crate::error::{StoreError, StoreResult};
use crate::ident::validate_identifier;
use crate::schema::open_and_migrate;
use crate::value::{cell_to_json, hex_encode, sql_quote_escape, Row};

/// Maximum rows returned by `LuaQuery` (§4.A, §8 scenario 5).
pub const LUA_QUERY_ROW_CAP: usize = 1000;
/// Maximum serialized output size for `LuaQuery`/`LuaScalar`.
pub const LUA_QUERY_BYTE_CAP: usize = 1024 * 1024;

/// Per-table insert policy controlling who may insert rows over the
/// data protocol (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPolicy {
    Owner,
    Email,
    Open,
    Public,
}

impl InsertPolicy {
    fn as_str(self) -> &'static str {
        match self {
            InsertPolicy::Owner => "owner",
            InsertPolicy::Email => "email",
            InsertPolicy::Open => "open",
            InsertPolicy::Public => "public",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "email" => InsertPolicy::Email,
            "open" => InsertPolicy::Open,
            "public" => InsertPolicy::Public,
            _ => InsertPolicy::Owner,
        }
    }

    /// Whether rows in a table under this policy are readable by any
    /// caller, unscoped by `_owner` (§4.G `query` remote path).
    pub fn is_openly_readable(self) -> bool {
        matches!(self, InsertPolicy::Owner | InsertPolicy::Public)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub col_type: String,
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub insert_policy: InsertPolicy,
}

#[derive(Debug, Default, Clone)]
pub struct SelectQuery {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub filter: Option<String>,
    pub args: Vec<Json>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

const SYSTEM_TABLES: &[&str] = &[
    "_meta",
    "_tables",
    "_peer_cache",
    "_favorites",
    "_groups",
    "_group_subscriptions",
    "_group_members",
];

/// Embedded single-process relational store.
///
/// One SQLite connection guarded by a single lock, per §4.A/§5 — every
/// operation, read or write, serializes through it. WAL mode plus a busy
/// timeout keep this from blocking any external inspection of the same
/// file (e.g. `sqlite3` opened read-only against it for debugging).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        open_and_migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        open_and_migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Register a new user table: validates identifiers, adds the
    /// implicit system columns, registers it with the default `owner`
    /// policy.
    pub fn create_table(&self, name: &str, columns: &[ColumnDef]) -> StoreResult<()> {
        validate_identifier(name, "table")?;
        for col in columns {
            validate_identifier(&col.name, "column")?;
        }

        let mut col_sql = String::new();
        for col in columns {
            col_sql.push_str(&format!(", \"{}\" {}", col.name, sanitize_type(&col.col_type)));
        }

        let sql = format!(
            "CREATE TABLE \"{name}\" (\
                _id INTEGER PRIMARY KEY AUTOINCREMENT, \
                _owner TEXT, \
                _owner_email TEXT, \
                _created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                _updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP{col_sql})"
        );

        let conn = self.conn.lock();
        conn.execute_batch(&sql)?;

        let schema_json = serde_json::to_string(
            &columns
                .iter()
                .map(|c| serde_json::json!({"name": c.name, "type": c.col_type}))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default();

        conn.execute(
            "INSERT INTO _tables (name, schema, insert_policy) VALUES (?1, ?2, 'owner')",
            rusqlite::params![name, schema_json],
        )?;
        Ok(())
    }

    /// Insert a row. The caller supplies `owner_id`/`owner_email` — the
    /// Store never derives them; that authority lives entirely in the
    /// dispatcher (§4.A).
    pub fn insert(
        &self,
        table: &str,
        owner_id: &str,
        owner_email: &str,
        values: &Row,
    ) -> StoreResult<i64> {
        validate_identifier(table, "table")?;
        self.require_table(table)?;

        let mut cols = vec!["_owner".to_string(), "_owner_email".to_string()];
        let mut placeholders = vec!["?".to_string(), "?".to_string()];
        let mut binds: Vec<Json> = vec![
            Json::String(owner_id.to_string()),
            Json::String(owner_email.to_string()),
        ];

        for (key, value) in values {
            if key.starts_with('_') {
                continue; // client-supplied system columns are silently overridden
            }
            validate_identifier(key, "column")?;
            cols.push(format!("\"{key}\""));
            placeholders.push("?".to_string());
            binds.push(value.clone());
        }

        let sql = format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({})",
            cols.join(", "),
            placeholders.join(", ")
        );

        let conn = self.conn.lock();
        let params = json_params(&binds);
        conn.execute(&sql, params_from_iter(params.iter()))?;
        Ok(conn.last_insert_rowid())
    }

    /// Unrestricted update (local caller only).
    pub fn update_row(&self, table: &str, id: i64, values: &Row) -> StoreResult<()> {
        self.update_row_inner(table, id, values, None)
    }

    /// Unrestricted delete (local caller only).
    pub fn delete_row(&self, table: &str, id: i64) -> StoreResult<()> {
        self.delete_row_inner(table, id, None)
    }

    /// Update that rejects rows not owned by `caller`, failing with
    /// `row-not-found-or-not-owned` when zero rows matched.
    pub fn update_row_owner(
        &self,
        table: &str,
        id: i64,
        caller: &str,
        values: &Row,
    ) -> StoreResult<()> {
        self.update_row_inner(table, id, values, Some(caller))
    }

    pub fn delete_row_owner(&self, table: &str, id: i64, caller: &str) -> StoreResult<()> {
        self.delete_row_inner(table, id, Some(caller))
    }

    fn update_row_inner(
        &self,
        table: &str,
        id: i64,
        values: &Row,
        caller: Option<&str>,
    ) -> StoreResult<()> {
        validate_identifier(table, "table")?;
        self.require_table(table)?;
        if id < 0 {
            return Err(StoreError::ValidRowIdRequired);
        }

        let mut sets = vec!["_updated_at = CURRENT_TIMESTAMP".to_string()];
        let mut binds: Vec<Json> = Vec::new();
        for (key, value) in values {
            if key.starts_with('_') {
                continue;
            }
            validate_identifier(key, "column")?;
            sets.push(format!("\"{key}\" = ?"));
            binds.push(value.clone());
        }

        let mut sql = format!("UPDATE \"{table}\" SET {} WHERE _id = ?", sets.join(", "));
        binds.push(Json::Number(id.into()));
        if let Some(owner) = caller {
            sql.push_str(" AND _owner = ?");
            binds.push(Json::String(owner.to_string()));
        }

        let conn = self.conn.lock();
        let params = json_params(&binds);
        let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
        if caller.is_some() && changed == 0 {
            return Err(StoreError::RowNotFoundOrNotOwned);
        }
        Ok(())
    }

    fn delete_row_inner(&self, table: &str, id: i64, caller: Option<&str>) -> StoreResult<()> {
        validate_identifier(table, "table")?;
        self.require_table(table)?;
        if id < 0 {
            return Err(StoreError::ValidRowIdRequired);
        }

        let mut sql = format!("DELETE FROM \"{table}\" WHERE _id = ?");
        let mut binds = vec![Json::Number(id.into())];
        if let Some(owner) = caller {
            sql.push_str(" AND _owner = ?");
            binds.push(Json::String(owner.to_string()));
        }

        let conn = self.conn.lock();
        let params = json_params(&binds);
        let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
        if caller.is_some() && changed == 0 {
            return Err(StoreError::RowNotFoundOrNotOwned);
        }
        Ok(())
    }

    /// `SelectPaged`: returns column-keyed value maps with binary fields
    /// emitted as text when printable and timestamps normalized.
    pub fn select_paged(&self, query: &SelectQuery) -> StoreResult<Vec<Row>> {
        validate_identifier(&query.table, "table")?;
        self.require_table(&query.table)?;

        let cols = match &query.columns {
            Some(cols) if !cols.is_empty() => {
                for c in cols {
                    validate_identifier(c, "column")?;
                }
                cols.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", ")
            }
            _ => "*".to_string(),
        };

        let mut sql = format!("SELECT {cols} FROM \"{}\"", query.table);
        if let Some(filter) = &query.filter {
            sql.push_str(&format!(" WHERE {filter}"));
        }
        sql.push_str(" LIMIT ?");
        let mut binds = query.args.clone();
        binds.push(Json::Number(query.limit.unwrap_or(100).into()));
        if let Some(offset) = query.offset {
            sql.push_str(" OFFSET ?");
            binds.push(Json::Number(offset.into()));
        }

        let conn = self.conn.lock();
        self.run_select(&conn, &sql, &binds, None)
    }

    pub fn insert_policy(&self, table: &str) -> StoreResult<InsertPolicy> {
        validate_identifier(table, "table")?;
        let conn = self.conn.lock();
        let policy: String = conn
            .query_row(
                "SELECT insert_policy FROM _tables WHERE name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|_| StoreError::TableNotFound(table.to_string()))?;
        Ok(InsertPolicy::parse(&policy))
    }

    pub fn tables(&self) -> StoreResult<Vec<TableInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name, schema, insert_policy FROM _tables")?;
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let schema: String = row.get(1)?;
                let policy: String = row.get(2)?;
                Ok((name, schema, policy))
            })?
            .filter_map(Result::ok)
            .map(|(name, schema, policy)| TableInfo {
                name,
                columns: parse_column_defs(&schema),
                insert_policy: InsertPolicy::parse(&policy),
            })
            .collect();
        Ok(rows)
    }

    pub fn describe(&self, table: &str) -> StoreResult<TableInfo> {
        validate_identifier(table, "table")?;
        self.tables()?
            .into_iter()
            .find(|t| t.name == table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    pub fn add_column(&self, table: &str, column: &ColumnDef) -> StoreResult<()> {
        validate_identifier(table, "table")?;
        validate_identifier(&column.name, "column")?;
        self.require_table(table)?;

        let conn = self.conn.lock();
        conn.execute_batch(&format!(
            "ALTER TABLE \"{table}\" ADD COLUMN \"{}\" {}",
            column.name,
            sanitize_type(&column.col_type)
        ))?;
        self.update_registry_schema(&conn, table, |defs| defs.push(column.clone()))
    }

    pub fn drop_column(&self, table: &str, column: &str) -> StoreResult<()> {
        validate_identifier(table, "table")?;
        validate_identifier(column, "column")?;
        self.require_table(table)?;

        let conn = self.conn.lock();
        conn.execute_batch(&format!("ALTER TABLE \"{table}\" DROP COLUMN \"{column}\""))?;
        self.update_registry_schema(&conn, table, |defs| defs.retain(|c| c.name != column))
    }

    pub fn rename_table(&self, old_name: &str, new_name: &str) -> StoreResult<()> {
        validate_identifier(old_name, "table")?;
        validate_identifier(new_name, "table")?;
        self.require_table(old_name)?;

        let conn = self.conn.lock();
        conn.execute_batch(&format!("ALTER TABLE \"{old_name}\" RENAME TO \"{new_name}\""))?;
        conn.execute(
            "UPDATE _tables SET name = ?1 WHERE name = ?2",
            rusqlite::params![new_name, old_name],
        )?;
        Ok(())
    }

    pub fn delete_table(&self, table: &str) -> StoreResult<()> {
        validate_identifier(table, "table")?;
        self.require_table(table)?;

        let conn = self.conn.lock();
        conn.execute_batch(&format!("DROP TABLE \"{table}\""))?;
        conn.execute("DELETE FROM _tables WHERE name = ?1", [table])?;
        Ok(())
    }

    /// Read-only, bounded SQL passthrough for the Lua dispatcher.
    /// Rejects anything not starting with `SELECT`/`WITH`, rejects
    /// multiple statements, hard-caps 1000 rows and 1 MiB output.
    pub fn lua_query(&self, sql: &str, args: &[Json]) -> StoreResult<Vec<Row>> {
        reject_multiple_statements(sql)?;
        let head = first_token(sql);
        if head != "SELECT" && head != "WITH" {
            return Err(StoreError::OnlySelectAllowed);
        }

        let conn = self.conn.lock();
        self.run_select(&conn, sql, args, Some(LUA_QUERY_ROW_CAP))
    }

    /// Single-value variant of `lua_query`.
    pub fn lua_scalar(&self, sql: &str, args: &[Json]) -> StoreResult<Json> {
        let rows = self.lua_query(sql, args)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.values().next().cloned())
            .unwrap_or(Json::Null))
    }

    /// Mutating SQL passthrough for the Lua dispatcher. Only
    /// `INSERT`/`UPDATE`/`DELETE`/`REPLACE` are accepted.
    pub fn lua_exec(&self, sql: &str, args: &[Json]) -> StoreResult<usize> {
        reject_multiple_statements(sql)?;
        let head = first_token(sql);
        if !matches!(head.as_str(), "INSERT" | "UPDATE" | "DELETE" | "REPLACE") {
            return Err(StoreError::OnlySelectAllowed);
        }

        let conn = self.conn.lock();
        let params = json_params(args);
        let changed = conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(changed)
    }

    /// Emit `CREATE TABLE` + `INSERT` statements for every registered
    /// user table.
    pub fn dump_sql(&self) -> StoreResult<String> {
        let conn = self.conn.lock();
        let mut out = String::new();

        let mut stmt = conn.prepare("SELECT name FROM _tables ORDER BY name")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(Result::ok)
            .collect();
        drop(stmt);

        for name in &names {
            let create_sql: String = conn.query_row(
                "SELECT sql FROM sqlite_master WHERE type='table' AND name = ?1",
                [name],
                |row| row.get(0),
            )?;
            out.push_str(&create_sql);
            out.push_str(";\n");

            let mut row_stmt = conn.prepare(&format!("SELECT * FROM \"{name}\""))?;
            let col_count = row_stmt.column_count();
            let col_names: Vec<String> = (0..col_count)
                .map(|i| row_stmt.column_name(i).unwrap_or_default().to_string())
                .collect();

            let mut rows = row_stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(col_count);
                for i in 0..col_count {
                    values.push(dump_literal(row.get_ref(i)?));
                }
                out.push_str(&format!(
                    "INSERT INTO \"{name}\" ({}) VALUES ({});\n",
                    col_names.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", "),
                    values.join(", ")
                ));
            }
        }

        Ok(out)
    }

    /// Lock and hand back the raw connection, for the fixed-shape system
    /// tables (peer cache, favorites) that live outside the dynamic user
    /// table registry. Crate-internal: every external caller goes through
    /// the typed methods in `peer_cache.rs`.
    pub(crate) fn raw_conn(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn require_table(&self, table: &str) -> StoreResult<()> {
        if SYSTEM_TABLES.contains(&table) {
            return Ok(());
        }
        let conn = self.conn.lock();
        let exists: bool = conn
            .query_row("SELECT 1 FROM _tables WHERE name = ?1", [table], |_| Ok(true))
            .unwrap_or(false);
        if exists {
            Ok(())
        } else {
            Err(StoreError::TableNotFound(table.to_string()))
        }
    }

    fn update_registry_schema(
        &self,
        conn: &Connection,
        table: &str,
        mutate: impl FnOnce(&mut Vec<ColumnDef>),
    ) -> StoreResult<()> {
        let schema: String =
            conn.query_row("SELECT schema FROM _tables WHERE name = ?1", [table], |row| row.get(0))?;
        let mut defs = parse_column_defs(&schema);
        mutate(&mut defs);
        let schema_json = serde_json::to_string(
            &defs
                .iter()
                .map(|c| serde_json::json!({"name": c.name, "type": c.col_type}))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default();
        conn.execute(
            "UPDATE _tables SET schema = ?1 WHERE name = ?2",
            rusqlite::params![schema_json, table],
        )?;
        Ok(())
    }

    fn run_select(
        &self,
        conn: &Connection,
        sql: &str,
        args: &[Json],
        row_cap: Option<usize>,
    ) -> StoreResult<Vec<Row>> {
        let mut stmt = conn.prepare(sql)?;
        let col_names: Vec<String> = (0..stmt.column_count())
            .map(|i| stmt.column_name(i).unwrap_or_default().to_string())
            .collect();

        let params = json_params(args);
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        let mut byte_estimate = 0usize;
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (i, name) in col_names.iter().enumerate() {
                let value = cell_to_json(row.get_ref(i)?, name);
                byte_estimate += name.len() + estimate_json_size(&value);
                map.insert(name.clone(), value);
            }
            out.push(map);

            if let Some(cap) = row_cap {
                if out.len() > cap || byte_estimate > LUA_QUERY_BYTE_CAP {
                    return Err(StoreError::ResultTooLarge);
                }
            }
        }
        Ok(out)
    }
}

fn estimate_json_size(value: &Json) -> usize {
    match value {
        Json::String(s) => s.len(),
        _ => 16,
    }
}

fn parse_column_defs(schema_json: &str) -> Vec<ColumnDef> {
    serde_json::from_str::<Vec<Json>>(schema_json)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| {
            Some(ColumnDef {
                name: v.get("name")?.as_str()?.to_string(),
                col_type: v.get("type")?.as_str()?.to_string(),
            })
        })
        .collect()
}

/// Restrict declared column types to SQLite's type affinities so a
/// caller-supplied type string can't smuggle arbitrary SQL.
fn sanitize_type(col_type: &str) -> &'static str {
    match col_type.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT" => "INTEGER",
        "REAL" | "FLOAT" | "DOUBLE" => "REAL",
        "BLOB" => "BLOB",
        _ => "TEXT",
    }
}

fn first_token(sql: &str) -> String {
    sql.trim()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// Reject any SQL containing a `;` other than a single trailing one.
fn reject_multiple_statements(sql: &str) -> StoreResult<()> {
    let trimmed = sql.trim().trim_end_matches(';');
    if trimmed.contains(';') {
        Err(StoreError::MultipleStatementsNotAllowed)
    } else {
        Ok(())
    }
}

fn json_params(values: &[Json]) -> Vec<Box<dyn rusqlite::ToSql>> {
    values
        .iter()
        .map(|v| -> Box<dyn rusqlite::ToSql> {
            match v {
                Json::Null => Box::new(rusqlite::types::Null),
                Json::Bool(b) => Box::new(*b),
                Json::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Box::new(i)
                    } else {
                        Box::new(n.as_f64().unwrap_or(0.0))
                    }
                }
                Json::String(s) => Box::new(s.clone()),
                other => Box::new(other.to_string()),
            }
        })
        .collect()
}

fn dump_literal(value: rusqlite::types::ValueRef<'_>) -> String {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            format!("'{}'", sql_quote_escape(&text))
        }
        ValueRef::Blob(bytes) => format!("X'{}'", hex_encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: &str) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            col_type: ty.to_string(),
        }
    }

    #[test]
    fn insert_then_select_round_trips() {
        let store = Store::open_in_memory().unwrap();
        store.create_table("t", &[col("c", "TEXT")]).unwrap();

        let mut values = Row::new();
        values.insert("c".to_string(), Json::String("x".to_string()));
        let id = store.insert("t", "alice", "alice@example.com", &values).unwrap();
        assert_eq!(id, 1);

        let rows = store
            .select_paged(&SelectQuery {
                table: "t".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["c"], Json::String("x".to_string()));
        assert_eq!(rows[0]["_owner"], Json::String("alice".to_string()));
    }

    #[test]
    fn insert_overrides_client_supplied_owner() {
        let store = Store::open_in_memory().unwrap();
        store.create_table("t", &[col("c", "TEXT")]).unwrap();

        let mut values = Row::new();
        values.insert("_owner".to_string(), Json::String("mallory".to_string()));
        values.insert("c".to_string(), Json::String("x".to_string()));
        store.insert("t", "alice", "a@example.com", &values).unwrap();

        let rows = store
            .select_paged(&SelectQuery {
                table: "t".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rows[0]["_owner"], Json::String("alice".to_string()));
    }

    #[test]
    fn update_row_owner_rejects_mismatched_owner() {
        let store = Store::open_in_memory().unwrap();
        store.create_table("t", &[col("c", "TEXT")]).unwrap();
        let mut values = Row::new();
        values.insert("c".to_string(), Json::String("x".to_string()));
        let id = store.insert("t", "alice", "a@example.com", &values).unwrap();

        let mut update = Row::new();
        update.insert("c".to_string(), Json::String("y".to_string()));
        let err = store.update_row_owner("t", id, "bob", &update).unwrap_err();
        assert!(matches!(err, StoreError::RowNotFoundOrNotOwned));
    }

    #[test]
    fn lua_query_rejects_non_select() {
        let store = Store::open_in_memory().unwrap();
        store.create_table("t", &[col("c", "TEXT")]).unwrap();
        let err = store.lua_query("DELETE FROM t", &[]).unwrap_err();
        assert!(matches!(err, StoreError::OnlySelectAllowed));
    }

    #[test]
    fn lua_query_rejects_multiple_statements() {
        let store = Store::open_in_memory().unwrap();
        let err = store.lua_query("SELECT 1; SELECT 2", &[]).unwrap_err();
        assert!(matches!(err, StoreError::MultipleStatementsNotAllowed));
    }

    #[test]
    fn lua_query_caps_rows() {
        let store = Store::open_in_memory().unwrap();
        store.create_table("t", &[col("c", "TEXT")]).unwrap();
        for i in 0..1500 {
            let mut values = Row::new();
            values.insert("c".to_string(), Json::String(format!("row{i}")));
            store.insert("t", "alice", "a@example.com", &values).unwrap();
        }
        let err = store.lua_query("SELECT * FROM t", &[]).unwrap_err();
        assert!(matches!(err, StoreError::ResultTooLarge));
    }

    #[test]
    fn dump_sql_round_trips() {
        let store = Store::open_in_memory().unwrap();
        store.create_table("t", &[col("c", "TEXT")]).unwrap();
        let mut values = Row::new();
        values.insert("c".to_string(), Json::String("hello".to_string()));
        store.insert("t", "alice", "a@example.com", &values).unwrap();

        let dump = store.dump_sql().unwrap();
        assert!(dump.contains("CREATE TABLE"));
        assert!(dump.contains("INSERT INTO \"t\""));
    }

    #[test]
    fn invalid_identifier_rejected() {
        let store = Store::open_in_memory().unwrap();
        let err = store.create_table("1bad", &[]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { .. }));
    }
}
