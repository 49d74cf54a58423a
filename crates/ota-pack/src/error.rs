//! Error types for bundle hashing.

use std::path::PathBuf;

use ota_core::ErrorKind;
use thiserror::Error;

/// Result type alias for hashing operations.
pub type PackResult<T> = Result<T, PackError>;

/// A malformed or unreadable upload. Every variant is an integrity failure.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("empty files: no hashable files under {}", .0.display())]
    EmptyBundle(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk bundle tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("hash worker failed: {0}")]
    Task(String),
}

impl PackError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Integrity
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackError::Io {
            path: path.into(),
            source,
        }
    }
}
