use std::sync::Arc;
use std::time::Duration;

use goop_store::{ColumnDef, InsertPolicy, SelectQuery, Store};
use goop_transport::NodeId;
use serde_json::Value as Json;

use crate::error::{DataOpError, DataOpResult};
use crate::lua::LuaDispatcher;
use crate::request::{DataRequest, DataResponse};

const LUA_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Who is asking. A local caller (the node's own UI/CLI/script talking
/// to its own store) gets the unrestricted path; a remote caller (the
/// peer on the other end of a `/goop/data/1.0.0` stream) gets the
/// owner/policy-scoped one (§4.G).
#[derive(Debug, Clone, Copy)]
pub enum Caller {
    Local,
    Remote(NodeId),
}

/// Dispatches data-protocol requests onto the [`Store`], applying
/// caller-ID scoping and insert policy, and bridging `lua-call`/
/// `lua-list` to an injected [`LuaDispatcher`].
pub struct DataOpEngine {
    store: Arc<Store>,
    lua: Option<Arc<dyn LuaDispatcher>>,
    self_identity: NodeId,
    self_email: String,
}

impl DataOpEngine {
    pub fn new(
        store: Arc<Store>,
        lua: Option<Arc<dyn LuaDispatcher>>,
        self_identity: NodeId,
        self_email: String,
    ) -> Self {
        Self {
            store,
            lua,
            self_identity,
            self_email,
        }
    }

    /// Dispatch one request, routing to the local or remote path per
    /// `caller`. Never panics or propagates — every failure becomes a
    /// `DataResponse::err`.
    pub async fn dispatch(&self, caller: Caller, req: DataRequest) -> DataResponse {
        match self.dispatch_inner(caller, req).await {
            Ok(resp) => resp,
            Err(e) => DataResponse::err(e),
        }
    }

    async fn dispatch_inner(&self, caller: Caller, req: DataRequest) -> DataOpResult<DataResponse> {
        match req.op.as_str() {
            "tables" => self.op_tables(),
            "describe" => self.op_describe(&req),
            "query" => self.op_query(caller, &req),
            "insert" => self.op_insert(caller, &req),
            "update" => self.op_update(caller, &req),
            "delete" => self.op_delete(caller, &req),
            "create-table" => self.op_create_table(caller, &req),
            "add-column" => self.op_add_column(caller, &req),
            "drop-column" => self.op_drop_column(caller, &req),
            "rename-table" => self.op_rename_table(caller, &req),
            "delete-table" => self.op_delete_table(caller, &req),
            "lua-call" => self.op_lua_call(caller, &req).await,
            "lua-list" => self.op_lua_list(),
            _ => Err(DataOpError::UnknownOp),
        }
    }

    fn op_tables(&self) -> DataOpResult<DataResponse> {
        let tables = self.store.tables()?;
        let data = tables
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "insert_policy": insert_policy_str(t.insert_policy),
                    "columns": t.columns.iter().map(|c| serde_json::json!({"name": c.name, "type": c.col_type})).collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>();
        Ok(DataResponse::ok(Json::Array(data)))
    }

    fn op_describe(&self, req: &DataRequest) -> DataOpResult<DataResponse> {
        let table = req.table.as_deref().ok_or(DataOpError::TableNameRequired)?;
        let info = self.store.describe(table)?;
        Ok(DataResponse::ok(serde_json::json!({
            "name": info.name,
            "insert_policy": insert_policy_str(info.insert_policy),
            "columns": info.columns.iter().map(|c| serde_json::json!({"name": c.name, "type": c.col_type})).collect::<Vec<_>>(),
        })))
    }

    fn op_query(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        let table = req.table.clone().ok_or(DataOpError::TableNameRequired)?;
        let mut filter = req.where_clause.clone();
        let mut args = req.args.clone().unwrap_or_default();

        if let Caller::Remote(id) = caller {
            let policy = self.store.insert_policy(&table)?;
            if !policy.is_openly_readable() {
                let scoped = match &filter {
                    Some(f) => format!("_owner = ? AND ({f})", f = f),
                    None => "_owner = ?".to_string(),
                };
                args.insert(0, Json::String(id.to_string()));
                filter = Some(scoped);
            }
        }

        let query = SelectQuery {
            table,
            columns: req.columns.clone(),
            filter,
            args,
            limit: req.limit,
            offset: req.offset,
        };
        let rows = self.store.select_paged(&query)?;
        Ok(DataResponse::ok(Json::Array(rows.into_iter().map(Json::Object).collect())))
    }

    fn op_insert(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        let table = req.table.clone().ok_or(DataOpError::TableNameRequired)?;
        let values = req.data.clone().unwrap_or_default();

        let (owner_id, owner_email) = match caller {
            Caller::Local => (self.self_identity.to_string(), self.self_email.clone()),
            Caller::Remote(id) => {
                let policy = self.store.insert_policy(&table)?;
                let email = values
                    .get("email")
                    .and_then(Json::as_str)
                    .unwrap_or("")
                    .to_string();
                match policy {
                    InsertPolicy::Owner => {
                        return Err(DataOpError::InsertNotAllowed {
                            reason: "owner-policy",
                        })
                    }
                    InsertPolicy::Email if email.is_empty() => {
                        return Err(DataOpError::InsertNotAllowed {
                            reason: "email-required",
                        })
                    }
                    InsertPolicy::Email | InsertPolicy::Open | InsertPolicy::Public => {}
                }
                (id.to_string(), email)
            }
        };

        let id = self.store.insert(&table, &owner_id, &owner_email, &values)?;
        Ok(DataResponse::ok(serde_json::json!({ "id": id })))
    }

    fn op_update(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        let table = req.table.as_deref().ok_or(DataOpError::TableNameRequired)?;
        let id = req.id.ok_or(DataOpError::RowIdRequired)?;
        let values = req.data.clone().unwrap_or_default();
        match caller {
            Caller::Local => self.store.update_row(table, id, &values)?,
            Caller::Remote(caller_id) => {
                self.store.update_row_owner(table, id, &caller_id.to_string(), &values)?
            }
        }
        Ok(DataResponse::ok_empty())
    }

    fn op_delete(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        let table = req.table.as_deref().ok_or(DataOpError::TableNameRequired)?;
        let id = req.id.ok_or(DataOpError::RowIdRequired)?;
        match caller {
            Caller::Local => self.store.delete_row(table, id)?,
            Caller::Remote(caller_id) => {
                self.store.delete_row_owner(table, id, &caller_id.to_string())?
            }
        }
        Ok(DataResponse::ok_empty())
    }

    fn op_create_table(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        self.require_local(caller)?;
        let name = req.name.as_deref().ok_or(DataOpError::TableNameRequired)?;
        let columns = req
            .column_defs
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|c| ColumnDef {
                name: c.name,
                col_type: c.col_type,
            })
            .collect::<Vec<_>>();
        self.store.create_table(name, &columns)?;
        Ok(DataResponse::ok_empty())
    }

    fn op_add_column(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        self.require_local(caller)?;
        let table = req.table.as_deref().ok_or(DataOpError::TableNameRequired)?;
        let defs = req.column_defs.clone().unwrap_or_default();
        let def = defs.first().ok_or(DataOpError::ColumnDefinitionRequired)?;
        self.store.add_column(
            table,
            &ColumnDef {
                name: def.name.clone(),
                col_type: def.col_type.clone(),
            },
        )?;
        Ok(DataResponse::ok_empty())
    }

    fn op_drop_column(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        self.require_local(caller)?;
        let table = req.table.as_deref().ok_or(DataOpError::TableNameRequired)?;
        let column = req.column.as_deref().ok_or(DataOpError::TableNameRequired)?;
        self.store.drop_column(table, column)?;
        Ok(DataResponse::ok_empty())
    }

    fn op_rename_table(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        self.require_local(caller)?;
        let old_name = req.old_name.as_deref().ok_or(DataOpError::TableNameRequired)?;
        let new_name = req.new_name.as_deref().ok_or(DataOpError::TableNameRequired)?;
        self.store.rename_table(old_name, new_name)?;
        Ok(DataResponse::ok_empty())
    }

    fn op_delete_table(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        self.require_local(caller)?;
        let table = req.table.as_deref().ok_or(DataOpError::TableNameRequired)?;
        self.store.delete_table(table)?;
        Ok(DataResponse::ok_empty())
    }

    async fn op_lua_call(&self, caller: Caller, req: &DataRequest) -> DataOpResult<DataResponse> {
        let lua = self.lua.as_ref().ok_or(DataOpError::LuaNotEnabled)?;
        let name = req.function.as_deref().ok_or(DataOpError::FunctionNotFound)?;
        let params = req.params.clone().unwrap_or(Json::Null);
        let caller_id = match caller {
            Caller::Local => self.self_identity,
            Caller::Remote(id) => id,
        };

        match tokio::time::timeout(LUA_CALL_TIMEOUT, lua.call_function(caller_id, name, params)).await {
            Ok(Ok(result)) => Ok(DataResponse::ok(result)),
            Ok(Err(msg)) => Err(DataOpError::Lua(msg)),
            Err(_) => Err(DataOpError::LuaTimeout),
        }
    }

    fn op_lua_list(&self) -> DataOpResult<DataResponse> {
        let lua = self.lua.as_ref().ok_or(DataOpError::LuaNotEnabled)?;
        let names = lua.list_data_functions();
        Ok(DataResponse::ok(Json::Array(names.into_iter().map(Json::String).collect())))
    }

    fn require_local(&self, caller: Caller) -> DataOpResult<()> {
        match caller {
            Caller::Local => Ok(()),
            Caller::Remote(_) => Err(DataOpError::SchemaOpNotAllowedForRemote),
        }
    }
}

fn insert_policy_str(policy: InsertPolicy) -> &'static str {
    match policy {
        InsertPolicy::Owner => "owner",
        InsertPolicy::Email => "email",
        InsertPolicy::Open => "open",
        InsertPolicy::Public => "public",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn node_id(seed: u8) -> NodeId {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed as u64);
        let secret = iroh::SecretKey::generate(&mut rng);
        NodeId::from_str(&secret.public().to_string()).unwrap()
    }

    fn engine() -> (DataOpEngine, NodeId) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let me = node_id(1);
        (
            DataOpEngine::new(store, None, me, "me@example.com".into()),
            me,
        )
    }

    fn req(op: &str) -> DataRequest {
        DataRequest {
            op: op.to_string(),
            table: None,
            name: None,
            data: None,
            id: None,
            where_clause: None,
            args: None,
            columns: None,
            column_defs: None,
            column: None,
            limit: None,
            offset: None,
            old_name: None,
            new_name: None,
            function: None,
            params: None,
        }
    }

    #[tokio::test]
    async fn unknown_op_rejected() {
        let (engine, _) = engine();
        let resp = engine.dispatch(Caller::Local, req("nonsense")).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap(), "unknown-op");
    }

    #[tokio::test]
    async fn local_insert_then_query() {
        let (engine, me) = engine();
        let mut create = req("create-table");
        create.name = Some("notes".into());
        create.column_defs = Some(vec![crate::request::ColumnDefReq {
            name: "body".into(),
            col_type: "TEXT".into(),
        }]);
        let resp = engine.dispatch(Caller::Local, create).await;
        assert!(resp.ok, "{:?}", resp.error);

        let mut insert = req("insert");
        insert.table = Some("notes".into());
        let mut data = serde_json::Map::new();
        data.insert("body".into(), Json::String("hello".into()));
        insert.data = Some(data);
        let resp = engine.dispatch(Caller::Local, insert).await;
        assert!(resp.ok, "{:?}", resp.error);

        let mut query = req("query");
        query.table = Some("notes".into());
        let resp = engine.dispatch(Caller::Remote(me), query).await;
        assert!(resp.ok, "{:?}", resp.error);
        let rows = resp.data.unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remote_insert_rejected_under_owner_policy() {
        let (engine, peer) = engine();
        let mut create = req("create-table");
        create.name = Some("secrets".into());
        create.column_defs = Some(vec![]);
        engine.dispatch(Caller::Local, create).await;

        let mut insert = req("insert");
        insert.table = Some("secrets".into());
        insert.data = Some(serde_json::Map::new());
        let resp = engine.dispatch(Caller::Remote(peer), insert).await;
        assert!(!resp.ok);
    }

    #[tokio::test]
    async fn remote_schema_ops_rejected() {
        let (engine, peer) = engine();
        let mut create = req("create-table");
        create.name = Some("x".into());
        let resp = engine.dispatch(Caller::Remote(peer), create).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap(), "schema operations not allowed for remote peers");
    }

    #[tokio::test]
    async fn remote_update_is_owner_scoped() {
        let (engine, peer) = engine();
        let mut create = req("create-table");
        create.name = Some("items".into());
        create.column_defs = Some(vec![crate::request::ColumnDefReq {
            name: "v".into(),
            col_type: "TEXT".into(),
        }]);
        engine.dispatch(Caller::Local, create).await;

        let mut insert = req("insert");
        insert.table = Some("items".into());
        insert.data = Some(serde_json::Map::new());
        let resp = engine.dispatch(Caller::Local, insert).await;
        let id = resp.data.unwrap()["id"].as_i64().unwrap();

        let mut update = req("update");
        update.table = Some("items".into());
        update.id = Some(id);
        update.data = Some(serde_json::Map::new());
        let resp = engine.dispatch(Caller::Remote(peer), update).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap(), "row-not-found-or-not-owned");
    }

    #[tokio::test]
    async fn lua_not_enabled_reports_clean_error() {
        let (engine, _) = engine();
        let mut call = req("lua-call");
        call.function = Some("greet".into());
        let resp = engine.dispatch(Caller::Local, call).await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap(), "lua-scripting-not-enabled");
    }
}
