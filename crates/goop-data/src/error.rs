/// Errors the data op engine returns. `Display` strings match the
/// stable wire error kinds in §7 where the data protocol is the
/// producer — a handler can `.to_string()` one of these straight onto
/// `{ok:false, error:<msg>}` without a translation table.
#[derive(Debug, thiserror::Error)]
pub enum DataOpError {
    #[error("invalid-json")]
    InvalidJson,

    #[error("unknown-op")]
    UnknownOp,

    #[error("table-name-required")]
    TableNameRequired,

    #[error("valid-row-id-required")]
    RowIdRequired,

    #[error("column-definition-required")]
    ColumnDefinitionRequired,

    #[error("schema operations not allowed for remote peers")]
    SchemaOpNotAllowedForRemote,

    #[error("insert-not-allowed-{reason}")]
    InsertNotAllowed { reason: &'static str },

    #[error("lua-scripting-not-enabled")]
    LuaNotEnabled,

    #[error("function-not-found")]
    FunctionNotFound,

    #[error("lua call timed out")]
    LuaTimeout,

    #[error("{0}")]
    Lua(String),

    #[error("{0}")]
    Store(#[from] goop_store::StoreError),
}

pub type DataOpResult<T> = Result<T, DataOpError>;
