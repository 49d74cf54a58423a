//! Platform detection from bundle file names.

use std::path::Path;
use std::sync::LazyLock;

use ota_core::PackageType;
use regex::Regex;
use tracing::debug;

use crate::error::{PackError, PackResult};
use crate::tree::enumerate_files;

static ANDROID_BUNDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"android\.bundle").expect("static pattern"));
static IOS_BUNDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"main\.jsbundle").expect("static pattern"));

/// Classify a bundle by the first path that names a platform entry file.
pub fn detect_package_type<I, S>(paths: I) -> PackageType
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for path in paths {
        let path = path.as_ref();
        if ANDROID_BUNDLE.is_match(path) {
            return PackageType::Android;
        }
        if IOS_BUNDLE.is_match(path) {
            return PackageType::Ios;
        }
    }
    PackageType::Unknown
}

/// Enumerate `root` and classify it. An empty directory is rejected.
pub fn detect_bundle_type(root: &Path) -> PackResult<PackageType> {
    let files = enumerate_files(root)?;
    if files.is_empty() {
        return Err(PackError::EmptyBundle(root.to_path_buf()));
    }
    let package_type = detect_package_type(files.iter().map(|f| f.relative.as_str()));
    debug!(root = %root.display(), %package_type, "bundle type detected");
    Ok(package_type)
}
