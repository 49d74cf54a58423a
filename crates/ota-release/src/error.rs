//! Error types for release lifecycle operations.

use ota_core::ErrorKind;
use ota_state::StateError;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("{0} already exists")]
    DuplicateName(String),

    #[error("Cannot find the deployment \"{0}\"")]
    NotFound(String),

    #[error("Cannot find user {0}")]
    UserNotFound(u64),

    #[error("transaction rolled back: {0}")]
    Transaction(#[source] StateError),

    #[error(transparent)]
    Store(#[from] StateError),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("token generation failed: {0}")]
    Token(String),
}

impl ReleaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReleaseError::DuplicateName(_)
            | ReleaseError::NotFound(_)
            | ReleaseError::UserNotFound(_) => ErrorKind::Validation,
            ReleaseError::Transaction(_) => ErrorKind::Transaction,
            ReleaseError::Store(e) => e.kind(),
            ReleaseError::Task(_) | ReleaseError::Token(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert!(ReleaseError::DuplicateName("x".into()).kind().is_client_error());
        assert!(ReleaseError::NotFound("x".into()).kind().is_client_error());
        assert!(ReleaseError::UserNotFound(1).kind().is_client_error());
    }

    #[test]
    fn purge_failures_are_transaction_errors() {
        let err = ReleaseError::Transaction(StateError::Write("disk full".into()));
        assert_eq!(err.kind(), ErrorKind::Transaction);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn messages_match_wire_text() {
        assert_eq!(
            ReleaseError::NotFound("Staging".into()).to_string(),
            "Cannot find the deployment \"Staging\""
        );
        assert_eq!(
            ReleaseError::DuplicateName("Staging".into()).to_string(),
            "Staging already exists"
        );
    }
}
