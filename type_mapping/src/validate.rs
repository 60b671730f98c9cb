//! Input validation for keys and hash fields

use crate::types::ValueError;

/// Reject blank cache keys
pub fn validate_key(key: &str) -> Result<&str, ValueError> {
    if key.trim().is_empty() {
        return Err(ValueError::EmptyKey);
    }
    Ok(key)
}

/// A hash write needs at least one field and no blank field names
pub fn validate_hash_fields(fields: &[(String, String)]) -> Result<(), ValueError> {
    if fields.is_empty() {
        return Err(ValueError::EmptyHash);
    }
    if let Some((field, _)) = fields.iter().find(|(field, _)| field.trim().is_empty()) {
        return Err(ValueError::InvalidField(format!("'{}' is blank", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("cache:user:1").is_ok());
        assert_eq!(validate_key("  "), Err(ValueError::EmptyKey));
    }

    #[test]
    fn test_validate_hash_fields() {
        assert_eq!(validate_hash_fields(&[]), Err(ValueError::EmptyHash));
        assert!(validate_hash_fields(&[("name".into(), "ana".into())]).is_ok());
        assert!(validate_hash_fields(&[(" ".into(), "x".into())]).is_err());
    }
}
