//! Error taxonomy produced by the data-access layer
//!
//! Every remote or validation failure is classified here, once, so callers
//! never have to sniff backend codes or message strings.

use thiserror::Error;

/// Failure of a store or backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The operation needs a signed-in principal and none is present, or the
    /// backend rejected the session.
    #[error("not signed in: {0}")]
    Unauthenticated(String),

    /// The referenced record no longer exists.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The backend's access control rejected the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed input, rejected locally or by the backend.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Network or backend failure; possibly retryable.
    #[error("backend unavailable: {0}")]
    Transient(String),
}

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    PermissionDenied,
    Validation,
    Transient,
}

impl StoreError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        StoreError::Unauthenticated(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        StoreError::PermissionDenied(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        StoreError::Transient(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Transient(_) => ErrorKind::Transient,
        }
    }

    /// Only transient failures are worth trying again. Nothing in this crate
    /// retries on its own; this is for callers that want to offer a retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::transient("request timed out")
        } else if e.is_connect() {
            StoreError::transient(format!("connection failed: {}", e))
        } else if e.is_decode() {
            StoreError::transient(format!("unexpected response body: {}", e))
        } else {
            StoreError::transient(format!("request failed: {}", e))
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(StoreError::transient("boom").is_retryable());
        assert!(!StoreError::validation("bad").is_retryable());
        assert!(!StoreError::not_found("recipe", "x").is_retryable());
        assert!(!StoreError::permission_denied("no").is_retryable());
        assert!(!StoreError::unauthenticated("who?").is_retryable());
    }

    #[test]
    fn test_not_found_message_names_record() {
        let err = StoreError::not_found("recipe", "abc123");
        assert_eq!(err.to_string(), "recipe 'abc123' not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
