//! Error types for guac-kv.
//!
//! Errors are layered: the storage layer reports [`StorageError`], input checks
//! report [`ValidationError`], and the backend wraps both in [`GuacError`]. Every
//! public backend operation tags its failures with the operation name so callers
//! see `"<operation> :: <cause>"`.

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised before any side effect takes place.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("uneven {left} and {right} for ingestion ({left_len} vs {right_len})")]
    UnevenBatch {
        left: &'static str,
        right: &'static str,
        left_len: usize,
        right_len: usize,
    },

    #[error("must specify exactly one of {options} (got {found})")]
    SubjectCount {
        options: &'static str,
        found: usize,
    },

    #[error("must specify at most one of {options} (got {found})")]
    FilterSubjectCount {
        options: &'static str,
        found: usize,
    },

    #[error("{field} is a zero time")]
    ZeroTime {
        field: &'static str,
    },

    #[error("provided spec has too many artifacts ({count}, max {max})")]
    TooManyArtifacts {
        count: usize,
        max: usize,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("scan window of {hours} hours is out of range")]
    ScanWindow {
        hours: i64,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Top-level error type for guac-kv.
#[derive(Debug, Error)]
pub enum GuacError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A referenced node could not be resolved.
    #[error("{what} not found")]
    NotFound {
        what: String,
    },

    /// An identifier exists but names a node of another kind.
    #[error("node {id} is not a {expected}")]
    TypeMismatch {
        id: String,
        expected: &'static str,
    },

    #[error("{operation} :: {source}")]
    Operation {
        operation: &'static str,
        source: Box<GuacError>,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl GuacError {
    /// Creates a reference-resolution error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wraps this error with the name of the operation it escaped from.
    #[must_use]
    pub fn in_operation(self, operation: &'static str) -> Self {
        Self::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// Strips every operation wrapper and returns the underlying cause.
    #[must_use]
    pub fn root(&self) -> &GuacError {
        let mut current = self;
        while let Self::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns true if the cause is a missing node or key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self.root() {
            Self::NotFound { .. } => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Returns true if the cause is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::Validation(_))
    }

    /// Returns true if the cause is an identifier of the wrong node kind.
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.root(), Self::TypeMismatch { .. })
    }
}

/// Result type alias for guac-kv operations.
pub type GuacResult<T> = Result<T, GuacError>;

/// Tags an error result with the operation that produced it.
pub(crate) trait OperationExt<T> {
    fn in_operation(self, operation: &'static str) -> GuacResult<T>;
}

impl<T, E: Into<GuacError>> OperationExt<T> for Result<T, E> {
    fn in_operation(self, operation: &'static str) -> GuacResult<T> {
        self.map_err(|e| e.into().in_operation(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uneven_batch_message() {
        let err = ValidationError::UnevenBatch {
            left: "packages",
            right: "certifyLegals",
            left_len: 3,
            right_len: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("uneven packages and certifyLegals"));
        assert!(msg.contains("3 vs 2"));
    }

    #[test]
    fn test_operation_wrapping_display() {
        let err = GuacError::not_found("license \"MIT\"").in_operation("IngestCertifyLegal");
        assert_eq!(err.to_string(), "IngestCertifyLegal :: license \"MIT\" not found");
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_root_unwraps_nested_operations() {
        let err = GuacError::from(ValidationError::ZeroTime { field: "knownSince" })
            .in_operation("inner")
            .in_operation("outer");
        assert!(err.is_validation());
        assert!(matches!(err.root(), GuacError::Validation(_)));
        assert!(err.to_string().starts_with("outer :: inner ::"));
    }

    #[test]
    fn test_storage_not_found_is_not_found() {
        let err: GuacError = StorageError::not_found("licenses", "abc").into();
        assert!(err.is_not_found());

        let err: GuacError = StorageError::Cancelled.into();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_operation_ext() {
        let res: Result<(), ValidationError> = Err(ValidationError::MissingField {
            field: "subject".to_string(),
        });
        let err = res.in_operation("IngestOccurrence").unwrap_err();
        assert!(err.to_string().contains("IngestOccurrence :: Validation error"));
    }
}
