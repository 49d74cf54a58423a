//! Package hash computation over a per-file manifest.
//!
//! The digest must agree byte-for-byte with the one client SDKs compute
//! from the same bundle, so the canonical string is built exactly as they
//! build it: `path:hash` tokens, sorted, rendered as a JSON string array
//! with `\/` collapsed to `/`.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::debug;

/// macOS archive resource-fork directory.
pub const IGNORE_MACOSX_PREFIX: &str = "__MACOSX/";

/// Finder metadata file.
pub const IGNORE_DS_STORE: &str = ".DS_Store";

/// Code-signing token shipped inside the bundle. Listed in the manifest,
/// excluded from the package hash.
pub const CODEPUSH_METADATA: &str = ".codepushrelease";

/// Per-file hashes keyed by normalized relative path.
pub type Manifest = BTreeMap<String, String>;

/// Whether a path is excluded from the manifest entirely.
pub fn is_hash_ignored(relative_path: &str) -> bool {
    if relative_path.is_empty() {
        return true;
    }
    relative_path.starts_with(IGNORE_MACOSX_PREFIX) || relative_path.ends_with(IGNORE_DS_STORE)
}

/// Whether a path is excluded from the package hash.
pub fn is_package_hash_ignored(relative_path: &str) -> bool {
    is_hash_ignored(relative_path) || relative_path.ends_with(CODEPUSH_METADATA)
}

/// Build the pre-digest string for a set of file hashes.
pub fn canonical_manifest<'a, I>(file_hashes: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut tokens: Vec<String> = file_hashes
        .into_iter()
        .filter(|(path, _)| !is_package_hash_ignored(path))
        .map(|(path, hash)| format!("{path}:{hash}"))
        .collect();
    tokens.sort();

    // A Vec<String> always serializes; the fallback is unreachable in practice.
    let json = serde_json::to_string(&tokens).unwrap_or_else(|_| String::from("[]"));
    json.replace("\\/", "/")
}

/// Reduce a manifest to the single hex SHA-256 identifying the package.
pub fn compute_package_hash<'a, I>(file_hashes: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let manifest_string = canonical_manifest(file_hashes);
    debug!(manifest = %manifest_string, "computing package hash");
    sha256_hex(manifest_string.as_bytes())
}

/// Hex SHA-256 of an in-memory buffer.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
