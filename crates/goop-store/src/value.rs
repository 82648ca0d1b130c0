use rusqlite::types::ValueRef;
use serde_json::Value as Json;

/// Column-keyed row produced by `SelectPaged` and the Lua query ops.
pub type Row = serde_json::Map<String, Json>;

/// Convert a single SQLite cell into a JSON value per §4.A's read-path
/// rules: binary fields are emitted as text when printable, timestamps
/// normalized to `YYYY-MM-DD HH:MM:SS`.
pub fn cell_to_json(value: ValueRef<'_>, column: &str) -> Json {
    match value {
        ValueRef::Null => Json::Null,
        ValueRef::Integer(i) => Json::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if is_timestamp_column(column) {
                Json::String(normalize_timestamp(&text))
            } else {
                Json::String(text)
            }
        }
        ValueRef::Blob(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if is_printable(text) => Json::String(text.to_string()),
            _ => Json::String(format!("0x{}", hex_encode(bytes))),
        },
    }
}

fn is_timestamp_column(column: &str) -> bool {
    matches!(column, "_created_at" | "_updated_at" | "created_at" | "last_seen" | "subscribed_at")
}

fn is_printable(text: &str) -> bool {
    text.chars().all(|c| !c.is_control() || c == '\n' || c == '\t')
}

/// Normalize a stored timestamp to `YYYY-MM-DD HH:MM:SS`.
///
/// Accepts SQLite's `CURRENT_TIMESTAMP` form unchanged and truncates any
/// fractional-seconds / `T`-separated ISO form down to the same shape.
/// §9(a): the Store boundary is where the timestamp representation
/// choice is made; everywhere above this function, timestamps are plain
/// text in this one format.
pub fn normalize_timestamp(raw: &str) -> String {
    let raw = raw.replacen('T', " ", 1);
    match raw.split_once('.') {
        Some((head, _)) => head.to_string(),
        None => raw,
    }
}

pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Escape a string for inclusion as a single-quoted SQL literal in
/// `DumpSQL` output (`'` → `''`).
pub fn sql_quote_escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_iso_and_fractional_timestamps() {
        assert_eq!(normalize_timestamp("2024-01-02 03:04:05"), "2024-01-02 03:04:05");
        assert_eq!(normalize_timestamp("2024-01-02T03:04:05"), "2024-01-02 03:04:05");
        assert_eq!(normalize_timestamp("2024-01-02 03:04:05.123"), "2024-01-02 03:04:05");
    }

    #[test]
    fn escapes_single_quotes() {
        assert_eq!(sql_quote_escape("it's"), "it''s");
    }
}
