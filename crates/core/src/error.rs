//! Error types for the record core
//!
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations. All errors are synchronous values returned at the call
//! site; nothing is retried internally.

use thiserror::Error;

/// Result type alias for record-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for record construction and mutation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Descriptor table rejected at construction time
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Field value rejected at record construction time
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised while building a field descriptor table
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two descriptors share a name
    #[error("duplicate field name `{field}` in type `{type_name}`")]
    DuplicateFieldName {
        /// Offending type
        type_name: String,
        /// Repeated field name
        field: String,
    },

    /// Two descriptors share a field tag
    #[error("duplicate field tag {tag} in type `{type_name}`")]
    DuplicateFieldTag {
        /// Offending type
        type_name: String,
        /// Repeated tag
        tag: u32,
    },

    /// Field tags are 1-based positive integers
    #[error("field tag must be positive for field `{field}` in type `{type_name}`")]
    ZeroFieldTag {
        /// Offending type
        type_name: String,
        /// Field declared with tag 0
        field: String,
    },

    /// Compact tag declared on a type that is not compact-eligible
    #[error(
        "type `{type_name}` is not compact-eligible: compact types have exactly one untagged field"
    )]
    NotCompactEligible {
        /// Offending type
        type_name: String,
    },
}

/// A field value failed its descriptor's shape check, or a required field
/// was missing. Always names the offending field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid field `{field}` of `{type_name}`: {reason}")]
pub struct ValidationError {
    /// Type being constructed
    pub type_name: String,
    /// First field that failed
    pub field: String,
    /// Human-readable mismatch description
    pub reason: String,
}

impl ValidationError {
    /// Build a validation error for one field of one type.
    pub fn new(
        type_name: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ValidationError {
            type_name: type_name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = ValidationError::new("User", "id", "expected Int, found Str");
        let msg = err.to_string();
        assert!(msg.contains("User"));
        assert!(msg.contains("id"));
        assert!(msg.contains("expected Int"));
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError::DuplicateFieldTag {
            type_name: "User".into(),
            tag: 3,
        };
        assert!(err.to_string().contains("duplicate field tag 3"));
    }

    #[test]
    fn error_from_validation() {
        let err: Error = ValidationError::new("T", "f", "bad").into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
