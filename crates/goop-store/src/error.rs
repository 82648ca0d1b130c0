/// Errors returned by the Store.
///
/// `Display` strings are the stable wire error kinds from the data
/// protocol's error-handling design — the Data Op Engine forwards them
/// verbatim in `{ok:false, error:<msg>}` responses.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid {kind} name")]
    InvalidName { kind: &'static str },

    #[error("table-name-required")]
    TableNameRequired,

    #[error("valid-row-id-required")]
    ValidRowIdRequired,

    #[error("column-definition-required")]
    ColumnDefinitionRequired,

    #[error("row-not-found-or-not-owned")]
    RowNotFoundOrNotOwned,

    #[error("result-too-large")]
    ResultTooLarge,

    #[error("only-select-allowed")]
    OnlySelectAllowed,

    #[error("multiple-statements-not-allowed")]
    MultipleStatementsNotAllowed,

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
