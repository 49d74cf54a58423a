//! End to end: hash a bundle on disk, release it, attach a diff, describe
//! and purge.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ota_core::config::HistoryConfig;
use ota_core::{PackageType, ReleaseMethod, UrlPrefixBlobStore};
use ota_release::{DeploymentManager, SequenceTokenGenerator, register_user};
use ota_state::{NewRelease, StateStore};

fn write_bundle(root: &Path, bundle: &str) {
    fs::create_dir_all(root.join("CodePush/assets")).unwrap();
    fs::write(root.join("CodePush/index.android.bundle"), bundle).unwrap();
    fs::write(root.join("CodePush/assets/logo.png"), b"\x89PNG").unwrap();
    fs::write(root.join("CodePush/.DS_Store"), b"finder junk").unwrap();
}

fn release_of(deployment_id: u64, user: u64, hash: &str, size: u64) -> NewRelease {
    NewRelease {
        deployment_id,
        app_version: "1.0.0".to_string(),
        description: Some("nightly".to_string()),
        package_hash: hash.to_string(),
        blob_url: format!("bundles/{hash}.zip"),
        manifest_blob_url: format!("manifests/{hash}.json"),
        size,
        is_mandatory: false,
        release_method: ReleaseMethod::Upload,
        original_label: None,
        original_deployment: None,
        released_by: user,
    }
}

#[tokio::test]
async fn bundle_release_describe_purge() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(&dir.path().join("ota.redb")).unwrap();
    let tokens = Arc::new(SequenceTokenGenerator::new(["qwertyuio"]));
    let manager = DeploymentManager::with_config(
        store.clone(),
        Arc::new(UrlPrefixBlobStore::new("https://cdn.example.com/ota")),
        tokens.clone(),
        &HistoryConfig::default(),
    );
    let user = register_user(&store, tokens.as_ref(), "ci@example.com").unwrap();
    let deployment = manager.create("Production", 7, user.id).unwrap();

    let v1_root = dir.path().join("v1");
    let v2_root = dir.path().join("v2");
    write_bundle(&v1_root, "console.log(1)");
    write_bundle(&v2_root, "console.log(2)");
    let v1 = ota_pack::digest_bundle(&v1_root, 2).await.unwrap();
    let v2 = ota_pack::digest_bundle(&v2_root, 2).await.unwrap();
    assert_eq!(v1.package_type, PackageType::Android);
    assert!(!v1.manifest.contains_key("CodePush/.DS_Store"));
    assert_ne!(v1.package_hash, v2.package_hash);

    manager
        .release(&release_of(deployment.id, user.id, &v1.package_hash, 100))
        .unwrap();
    let latest = manager
        .release(&release_of(deployment.id, user.id, &v2.package_hash, 120))
        .unwrap();
    manager
        .add_diff(latest.id, &v1.package_hash, "diffs/v1-v2.zip", 12)
        .unwrap();

    let listing = manager.list(7).await.unwrap();
    assert_eq!(listing.len(), 1);
    let served = listing[0].package.as_ref().unwrap();
    assert_eq!(served.label, "v2");
    assert_eq!(served.package_hash, v2.package_hash);
    assert_eq!(served.blob_url, format!("https://cdn.example.com/ota/bundles/{}.zip", v2.package_hash));
    assert_eq!(served.released_by.as_deref(), Some("ci@example.com"));
    let diffs = served.diff_package_map.as_ref().unwrap();
    assert_eq!(diffs[&v1.package_hash].size, 12);
    assert_eq!(diffs[&v1.package_hash].url, "https://cdn.example.com/ota/diffs/v1-v2.zip");

    let history = manager.history(deployment.id, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[1].as_ref().unwrap().diff_package_map.is_none());

    let report = manager.purge_all(deployment.id).unwrap();
    assert_eq!(report.packages, 2);
    assert_eq!(report.diffs, 1);
    assert!(manager.history(deployment.id, None).await.unwrap().is_empty());
    assert!(manager.list(7).await.unwrap()[0].package.is_none());
}
