//! Directory tree hashing.
//!
//! Enumerates a bundle directory, drops OS metadata, hashes every remaining
//! file on a bounded pool of blocking workers and returns the manifest keyed
//! by the path clients use. Either every file hashes or the whole call fails.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{PackError, PackResult};
use crate::manifest::{Manifest, is_hash_ignored};

/// Folder every nested bundle entry is re-rooted under.
pub const CANONICAL_ROOT: &str = "CodePush";

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// A file selected for hashing.
#[derive(Debug, Clone)]
pub struct BundleFile {
    /// Absolute (or root-joined) location on disk.
    pub path: PathBuf,
    /// Slash-separated path relative to the bundle root.
    pub relative: String,
}

/// List every regular file under `root`, relative paths slash-normalized.
pub fn enumerate_files(root: &Path) -> PackResult<Vec<BundleFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push(BundleFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Rewrite a bundle-relative path into its manifest form.
///
/// Nested entries lose their top-level directory and are placed under
/// [`CANONICAL_ROOT`], so `bundle/assets/a.png` becomes `CodePush/assets/a.png`
/// however the archive was wrapped. Top-level files keep their name.
pub fn normalize_relative_path(relative: &str) -> String {
    let relative = relative.replace('\\', "/");
    match relative.find('/') {
        Some(idx) => {
            let rest = relative[idx..].trim_start_matches('/');
            if rest.is_empty() {
                CANONICAL_ROOT.to_string()
            } else {
                format!("{CANONICAL_ROOT}/{rest}")
            }
        }
        None => relative,
    }
}

/// Streaming SHA-256 of a file's contents.
pub fn hash_file(path: &Path) -> PackResult<String> {
    let file = File::open(path).map_err(|e| PackError::io(path, e))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    loop {
        let n = reader.read(&mut buf).map_err(|e| PackError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash every non-ignored file under `root` using up to `workers` threads.
pub async fn hash_tree(root: &Path, workers: usize) -> PackResult<Manifest> {
    let walk_root = root.to_path_buf();
    let files = tokio::task::spawn_blocking(move || enumerate_files(&walk_root))
        .await
        .map_err(|e| PackError::Task(e.to_string()))??;

    let files: Vec<BundleFile> = files
        .into_iter()
        .filter(|f| !is_hash_ignored(&f.relative))
        .collect();
    if files.is_empty() {
        debug!(root = %root.display(), "no hashable files");
        return Err(PackError::EmptyBundle(root.to_path_buf()));
    }

    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();
    for file in files {
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| PackError::Task(e.to_string()))?;
            let path = file.path.clone();
            let digest = tokio::task::spawn_blocking(move || hash_file(&path))
                .await
                .map_err(|e| PackError::Task(e.to_string()))??;
            Ok::<_, PackError>((file.relative, digest))
        });
    }

    let mut hashed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        // Dropping the JoinSet on early return aborts the remaining tasks.
        let entry = joined.map_err(|e| PackError::Task(e.to_string()))??;
        hashed.push(entry);
    }

    // Colliding rewrites resolve in favour of the greatest source path.
    hashed.sort_by(|a, b| a.0.cmp(&b.0));
    let mut manifest = Manifest::new();
    for (relative, digest) in hashed {
        manifest.insert(normalize_relative_path(&relative), digest);
    }
    debug!(root = %root.display(), files = manifest.len(), "bundle tree hashed");
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{compute_package_hash, sha256_hex};
    use std::fs;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn normalize_rewrites_wrapper_directory() {
        assert_eq!(normalize_relative_path("main.jsbundle"), "main.jsbundle");
        assert_eq!(
            normalize_relative_path("bundle/assets/a.png"),
            "CodePush/assets/a.png"
        );
        assert_eq!(normalize_relative_path("x\\y\\z.js"), "CodePush/y/z.js");
        assert_eq!(normalize_relative_path("CodePush/index.js"), "CodePush/index.js");
    }

    #[test]
    fn hash_file_streams_large_contents() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![7u8; READ_BUFFER_BYTES * 3 + 17];
        write(dir.path(), "big.bin", &data);
        assert_eq!(hash_file(&dir.path().join("big.bin")).unwrap(), sha256_hex(&data));
    }

    #[test]
    fn hash_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, PackError::Io { .. }));
    }

    #[tokio::test]
    async fn hashes_every_file_with_normalized_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bundle/index.android.bundle", b"js");
        write(dir.path(), "bundle/assets/logo.png", b"png");
        write(dir.path(), "top.txt", b"top");

        let manifest = hash_tree(dir.path(), 2).await.unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest["CodePush/index.android.bundle"], sha256_hex(b"js"));
        assert_eq!(manifest["CodePush/assets/logo.png"], sha256_hex(b"png"));
        assert_eq!(manifest["top.txt"], sha256_hex(b"top"));
    }

    #[tokio::test]
    async fn drops_os_metadata_but_keeps_release_token() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bundle/main.jsbundle", b"js");
        write(dir.path(), "bundle/.DS_Store", b"finder");
        write(dir.path(), "__MACOSX/bundle/._main.jsbundle", b"fork");
        write(dir.path(), "bundle/.codepushrelease", b"jwt");

        let manifest = hash_tree(dir.path(), 4).await.unwrap();
        let keys: Vec<&str> = manifest.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["CodePush/.codepushrelease", "CodePush/main.jsbundle"]);

        let mut without_token = manifest.clone();
        without_token.remove("CodePush/.codepushrelease");
        assert_eq!(
            compute_package_hash(&manifest),
            compute_package_hash(&without_token)
        );
    }

    #[tokio::test]
    async fn identical_copies_hash_identically() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let relocated = b.path().join("nested/deeper");
        for root in [a.path(), relocated.as_path()] {
            write(root, "bundle/index.android.bundle", b"console.log(1)");
            write(root, "bundle/assets/img.png", &[0, 1, 2, 3]);
        }

        let first = hash_tree(a.path(), 1).await.unwrap();
        let second = hash_tree(&relocated, 8).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(compute_package_hash(&first), compute_package_hash(&second));
    }

    #[tokio::test]
    async fn only_ignored_files_is_empty_bundle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".DS_Store", b"finder");
        let err = hash_tree(dir.path(), 2).await.unwrap_err();
        assert!(matches!(err, PackError::EmptyBundle(_)));
    }

    #[tokio::test]
    async fn missing_root_fails_without_partial_map() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_tree(&dir.path().join("absent"), 2).await.unwrap_err();
        assert!(matches!(err, PackError::Walk(_)));
    }
}
