//! ota-pack: release bundle integrity.
//!
//! Computes the per-file manifest of an uploaded bundle, reduces it to the
//! package hash clients use to detect updates, and classifies the bundle's
//! target platform.

use std::path::Path;

use ota_core::PackageType;
use tracing::info;

pub mod detect;
pub mod error;
pub mod manifest;
pub mod tree;

pub use detect::{detect_bundle_type, detect_package_type};
pub use error::{PackError, PackResult};
pub use manifest::{
    Manifest, canonical_manifest, compute_package_hash, is_hash_ignored, is_package_hash_ignored,
};
pub use tree::{hash_file, hash_tree, normalize_relative_path};

/// Everything derived from a bundle directory at upload time.
#[derive(Debug, Clone)]
pub struct BundleDigest {
    /// Full per-file listing delivered to clients (includes `.codepushrelease`).
    pub manifest: Manifest,
    pub package_hash: String,
    pub package_type: PackageType,
}

/// Hash and classify the bundle rooted at `root`.
pub async fn digest_bundle(root: &Path, workers: usize) -> PackResult<BundleDigest> {
    let manifest = hash_tree(root, workers).await?;
    let package_hash = compute_package_hash(&manifest);
    let package_type = detect_package_type(manifest.keys());
    info!(
        root = %root.display(),
        files = manifest.len(),
        %package_hash,
        %package_type,
        "bundle digested"
    );
    Ok(BundleDigest {
        manifest,
        package_hash,
        package_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn digest_combines_hash_and_type() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/index.android.bundle"), b"bundle").unwrap();
        fs::write(dir.path().join("out/.codepushrelease"), b"jwt").unwrap();

        let digest = digest_bundle(dir.path(), 2).await.unwrap();
        assert_eq!(digest.package_type, PackageType::Android);
        assert_eq!(digest.manifest.len(), 2);
        assert_eq!(digest.package_hash, compute_package_hash(&digest.manifest));
    }

    #[tokio::test]
    async fn empty_bundle_error_is_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_bundle(dir.path(), 2).await.unwrap_err();
        assert_eq!(err.kind(), ota_core::ErrorKind::Integrity);
    }
}
