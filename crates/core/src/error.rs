//! Core Error Types
//!
//! Defines the foundational error types used by the entity model. These error
//! types are dependency-free (only thiserror + std) to keep the core crate
//! lightweight.
//!
//! The main application crate maps these onto its own error type, which adds
//! storage, serialization, and protocol variants.

use thiserror::Error;

/// Core error type for the project memory workspace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Validation errors (missing or malformed caller input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal status change for a lifecycle-bearing entity
    #[error("Invalid {entity} status transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Parse errors (stored or supplied text that does not name a known value)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a validation error for a required field that is absent or blank
    pub fn missing_field(field: &str) -> Self {
        Self::Validation(format!("missing required field `{}`", field))
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::validation("priority must be between 1 and 5");
        assert_eq!(
            err.to_string(),
            "Validation error: priority must be between 1 and 5"
        );
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let err = CoreError::missing_field("title");
        assert_eq!(
            err.to_string(),
            "Validation error: missing required field `title`"
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = CoreError::InvalidTransition {
            entity: "story",
            from: "completed".into(),
            to: "active".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid story status transition: completed -> active"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err = CoreError::not_found("story #7");
        let msg: String = err.into();
        assert_eq!(msg, "Not found: story #7");
    }
}
