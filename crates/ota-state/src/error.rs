//! State store errors.

use ota_core::ErrorKind;
use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// Backend failures carry redb's message; `Conflict` and `NotFound` are
/// raised by the store itself.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state database: {0}")]
    Open(String),

    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("cannot open table: {0}")]
    Table(String),

    #[error("row read failed: {0}")]
    Read(String),

    #[error("row write failed: {0}")]
    Write(String),

    #[error("cannot encode row: {0}")]
    Encode(String),

    #[error("corrupt row: {0}")]
    Decode(String),

    /// A name or key index already holds the value.
    #[error("{0}")]
    Conflict(String),

    #[error("{0} does not exist")]
    NotFound(String),
}

impl StateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StateError::Conflict(_) | StateError::NotFound(_) => ErrorKind::Validation,
            StateError::Transaction(_) => ErrorKind::Transaction,
            StateError::Open(_)
            | StateError::Table(_)
            | StateError::Read(_)
            | StateError::Write(_)
            | StateError::Encode(_)
            | StateError::Decode(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_raised_errors_are_validation() {
        assert_eq!(StateError::Conflict("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            StateError::NotFound("package 4".into()).to_string(),
            "package 4 does not exist"
        );
        assert_eq!(StateError::Decode("eof".into()).kind(), ErrorKind::Storage);
    }
}
