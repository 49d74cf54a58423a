//! Blob references and download URL resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum BlobRef {
    /// Already a public URL: https://cdn.example.com/bundles/abc
    Https { url: String },
    /// S3 object: s3://bucket/path/to/blob
    S3 { bucket: String, key: String },
    /// Storage key relative to the configured download base.
    Key { key: String },
}

#[derive(Debug, Error)]
pub enum BlobRefError {
    #[error("empty blob reference")]
    Empty,
    #[error("invalid blob reference: {0}")]
    InvalidRef(String),
}

impl BlobRef {
    pub fn parse(blob_ref: &str) -> Result<Self, BlobRefError> {
        if blob_ref.is_empty() {
            return Err(BlobRefError::Empty);
        }
        if blob_ref.starts_with("https://") || blob_ref.starts_with("http://") {
            Ok(BlobRef::Https { url: blob_ref.to_string() })
        } else if let Some(rest) = blob_ref.strip_prefix("s3://") {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| BlobRefError::InvalidRef(blob_ref.to_string()))?;
            Ok(BlobRef::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        } else {
            Ok(BlobRef::Key {
                key: blob_ref.trim_start_matches('/').to_string(),
            })
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            BlobRef::Https { .. } => "https",
            BlobRef::S3 { .. } => "s3",
            BlobRef::Key { .. } => "key",
        }
    }
}

/// Turns stored blob references into client-fetchable URLs.
pub trait BlobStore: Send + Sync {
    fn download_url(&self, blob_ref: &str) -> String;
}

/// Resolves relative keys (and S3 object keys) against a fixed base URL.
#[derive(Debug, Clone)]
pub struct UrlPrefixBlobStore {
    base_url: String,
}

impl UrlPrefixBlobStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl BlobStore for UrlPrefixBlobStore {
    fn download_url(&self, blob_ref: &str) -> String {
        match BlobRef::parse(blob_ref) {
            Ok(BlobRef::Https { url }) => url,
            Ok(BlobRef::S3 { key, .. }) | Ok(BlobRef::Key { key }) => {
                format!("{}/{}", self.base_url, key)
            }
            Err(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https() {
        let blob = BlobRef::parse("https://cdn.example.com/a/b").unwrap();
        assert_eq!(blob.scheme(), "https");
    }

    #[test]
    fn test_parse_s3() {
        let blob = BlobRef::parse("s3://releases/bundles/abc").unwrap();
        assert_eq!(
            blob,
            BlobRef::S3 {
                bucket: "releases".to_string(),
                key: "bundles/abc".to_string()
            }
        );
    }

    #[test]
    fn test_parse_bare_key() {
        let blob = BlobRef::parse("/FpPq3abc").unwrap();
        assert_eq!(blob, BlobRef::Key { key: "FpPq3abc".to_string() });
    }

    #[test]
    fn test_parse_rejects_s3_without_key() {
        assert!(BlobRef::parse("s3://bucket-only").is_err());
        assert!(BlobRef::parse("").is_err());
    }

    #[test]
    fn test_prefix_store_joins_keys() {
        let store = UrlPrefixBlobStore::new("https://cdn.example.com/download/");
        assert_eq!(
            store.download_url("FpPq3abc"),
            "https://cdn.example.com/download/FpPq3abc"
        );
        assert_eq!(
            store.download_url("s3://bucket/x/y"),
            "https://cdn.example.com/download/x/y"
        );
    }

    #[test]
    fn test_prefix_store_passes_absolute_urls_through() {
        let store = UrlPrefixBlobStore::new("https://cdn.example.com");
        assert_eq!(
            store.download_url("https://other.example.com/blob"),
            "https://other.example.com/blob"
        );
        assert_eq!(store.download_url(""), "");
    }
}
