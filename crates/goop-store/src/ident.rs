use crate::error::StoreError;

/// Validate an identifier against `^[A-Za-z_][A-Za-z0-9_]{0,63}$`.
///
/// Used at every entry point that lets a name reach raw SQL: table
/// names, column names, and the `old_name`/`new_name` pair of a rename.
/// `kind` labels the failure (`"table"`, `"column"`, ...) per the wire
/// error kind `invalid <kind> name`.
pub fn validate_identifier(name: &str, kind: &'static str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => true,
        _ => false,
    } && name.len() <= 64
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName { kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_identifiers() {
        assert!(validate_identifier("users", "table").is_ok());
        assert!(validate_identifier("_private", "table").is_ok());
        assert!(validate_identifier("a", "column").is_ok());
        assert!(validate_identifier(&"x".repeat(64), "table").is_ok());
    }

    #[test]
    fn rejects_invalid_identifiers() {
        assert!(validate_identifier("", "table").is_err());
        assert!(validate_identifier("1abc", "table").is_err());
        assert!(validate_identifier("has space", "table").is_err());
        assert!(validate_identifier("drop;table", "table").is_err());
        assert!(validate_identifier(&"x".repeat(65), "table").is_err());
    }
}
