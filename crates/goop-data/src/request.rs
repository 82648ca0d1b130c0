use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One JSON-line request on the data protocol (§4.F, §4.G). Every field
/// beyond `op` is optional — which ones are required depends on the op,
/// checked by [`crate::engine::DataOpEngine`].
#[derive(Debug, Clone, Deserialize)]
pub struct DataRequest {
    pub op: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Map<String, Json>>,
    #[serde(default)]
    pub id: Option<i64>,
    /// SQL fragment to splice into a `WHERE` clause. Renamed from the
    /// wire key `where`, a reserved word in Rust.
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<Json>>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub column_defs: Option<Vec<ColumnDefReq>>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub old_name: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub params: Option<Json>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDefReq {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
}

/// One JSON-line response on the data protocol: `{ok, data?, error?}`.
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DataResponse {
    pub fn ok(data: Json) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            ok: true,
            data: None,
            error: None,
        }
    }

    pub fn err(error: impl std::fmt::Display) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}
