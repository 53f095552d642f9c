//! Kernel error types.

use thiserror::Error;

/// Kernel errors.
///
/// Partial category-path resolution and filters that structurally match
/// nothing are not errors; they compile and return empty results.
#[derive(Debug, Error)]
pub enum Error {
    /// A filter or display value is malformed. Nothing was compiled.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The query builder produced a parameter type the binder does not carry.
    #[error("unsupported query parameter: {0}")]
    UnsupportedParameter(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    /// Field name for validation errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Error::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type alias using the kernel [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_field() {
        let err = Error::validation("pager.size", "must be at least 1");
        assert_eq!(err.field(), Some("pager.size"));
        assert_eq!(err.to_string(), "invalid pager.size: must be at least 1");
    }

    #[test]
    fn unsupported_parameter_has_no_field() {
        let err = Error::UnsupportedParameter("Float(Some(1.0))".to_string());
        assert_eq!(err.field(), None);
    }
}
