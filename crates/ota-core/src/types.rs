//! Shared types used across the OTA crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Platform target a release bundle was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    #[default]
    Unknown,
    Ios,
    Android,
}

impl PackageType {
    /// Numeric code stored by clients and older tooling.
    pub fn code(&self) -> u8 {
        match self {
            PackageType::Unknown => 0,
            PackageType::Ios => 1,
            PackageType::Android => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PackageType::Unknown => "unknown",
            PackageType::Ios => "ios",
            PackageType::Android => "android",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a package came to exist in its deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReleaseMethod {
    #[default]
    Upload,
    Promote,
    Rollback,
}

impl ReleaseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseMethod::Upload => "Upload",
            ReleaseMethod::Promote => "Promote",
            ReleaseMethod::Rollback => "Rollback",
        }
    }
}

/// Coarse error classification shared by every crate's error enum.
///
/// Transports map `Validation` to a 4xx response; everything else is a
/// server-side failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-correctable: duplicate names, unknown deployments or users.
    Validation,
    /// Malformed upload: empty bundle, unreadable file.
    Integrity,
    /// A multi-row mutation was rolled back.
    Transaction,
    /// Underlying storage or runtime failure.
    Storage,
}

impl ErrorKind {
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::Validation)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_type_codes() {
        assert_eq!(PackageType::Unknown.code(), 0);
        assert_eq!(PackageType::Ios.code(), 1);
        assert_eq!(PackageType::Android.code(), 2);
    }

    #[test]
    fn release_method_serializes_as_name() {
        let json = serde_json::to_string(&ReleaseMethod::Promote).unwrap();
        assert_eq!(json, "\"Promote\"");
        assert_eq!(ReleaseMethod::Rollback.as_str(), "Rollback");
    }

    #[test]
    fn only_validation_is_client_error() {
        assert!(ErrorKind::Validation.is_client_error());
        assert!(!ErrorKind::Integrity.is_client_error());
        assert!(!ErrorKind::Transaction.is_client_error());
    }
}
