//! Client-facing release descriptors.
//!
//! A descriptor is rebuilt from stored rows on every query: the package
//! itself, the diffs that target it, the user who released it and the
//! deployment version it belongs to. The three auxiliary reads run
//! concurrently and the descriptor is only built once all of them succeed.

use std::collections::BTreeMap;
use std::sync::Arc;

use ota_core::{BlobStore, ReleaseMethod};
use ota_state::{
    DeploymentVersion, DeploymentVersionId, Package, PackageDiff, PackageId, StateResult,
    StateStore, User,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReleaseError, ReleaseResult};

/// Rollout percentage reported at this layer; partial rollout is decided
/// by the update-check path.
pub const FULL_ROLLOUT: u8 = 100;

/// Where to fetch a delta from an older package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffPackage {
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    pub description: Option<String>,
    pub is_disabled: bool,
    pub is_mandatory: bool,
    pub rollout: u8,
    pub app_version: Option<String>,
    pub package_hash: String,
    pub blob_url: String,
    pub size: u64,
    pub manifest_blob_url: String,
    /// Source package hash → delta download. `None` when no diff exists.
    pub diff_package_map: Option<BTreeMap<String, DiffPackage>>,
    pub release_method: ReleaseMethod,
    /// Milliseconds since the Unix epoch.
    pub upload_time: u64,
    pub original_label: Option<String>,
    pub original_deployment: Option<String>,
    pub label: String,
    /// Email of the releasing user, if that user still exists.
    pub released_by: Option<String>,
}

/// Builds [`PackageDescriptor`]s from the state store.
#[derive(Clone)]
pub struct ReleaseAssembler {
    store: StateStore,
    blobs: Arc<dyn BlobStore>,
}

impl ReleaseAssembler {
    pub fn new(store: StateStore, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Descriptor for one package, or `None` if the package does not exist.
    pub async fn describe_package(
        &self,
        package_id: PackageId,
    ) -> ReleaseResult<Option<PackageDescriptor>> {
        let store = self.store.clone();
        let Some(package) = blocking(move || store.get_package(package_id)).await? else {
            debug!(package_id, "no such package");
            return Ok(None);
        };

        let diffs_store = self.store.clone();
        let user_store = self.store.clone();
        let version_store = self.store.clone();
        let released_by = package.released_by;
        let version_id = package.deployment_version_id;
        let (diffs, user, version) = tokio::try_join!(
            blocking(move || diffs_store.list_diffs_for_package(package_id)),
            blocking(move || user_store.get_user(released_by)),
            blocking(move || version_store.get_deployment_version(version_id)),
        )?;

        Ok(Some(self.assemble(package, diffs, user, version)))
    }

    /// Descriptor for the package a deployment version currently serves.
    pub async fn describe_version(
        &self,
        version_id: DeploymentVersionId,
    ) -> ReleaseResult<Option<PackageDescriptor>> {
        let store = self.store.clone();
        match blocking(move || store.get_deployment_version(version_id)).await? {
            Some(version) => self.describe_package(version.current_package_id).await,
            None => Ok(None),
        }
    }

    /// Combine loaded rows into a descriptor.
    pub fn assemble(
        &self,
        package: Package,
        diffs: Vec<PackageDiff>,
        user: Option<User>,
        version: Option<DeploymentVersion>,
    ) -> PackageDescriptor {
        let diff_package_map = (!diffs.is_empty()).then(|| self.diff_map(diffs));
        PackageDescriptor {
            description: package.description,
            is_disabled: false,
            is_mandatory: package.is_mandatory,
            rollout: FULL_ROLLOUT,
            app_version: version.map(|v| v.app_version),
            blob_url: self.blobs.download_url(&package.blob_url),
            manifest_blob_url: self.blobs.download_url(&package.manifest_blob_url),
            package_hash: package.package_hash,
            size: package.size,
            diff_package_map,
            release_method: package.release_method,
            upload_time: package.updated_at,
            original_label: package.original_label,
            original_deployment: package.original_deployment,
            label: package.label,
            released_by: user.map(|u| u.email),
        }
    }

    fn diff_map(&self, diffs: Vec<PackageDiff>) -> BTreeMap<String, DiffPackage> {
        // Rows arrive newest first; fold oldest first so the newest diff wins.
        diffs
            .into_iter()
            .rev()
            .map(|diff| {
                let entry = DiffPackage {
                    size: diff.diff_size,
                    url: self.blobs.download_url(&diff.diff_blob_url),
                };
                (diff.diff_against_package_hash, entry)
            })
            .collect()
    }
}

/// Run a store read on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> ReleaseResult<T>
where
    F: FnOnce() -> StateResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ReleaseError::Task(e.to_string()))?
        .map_err(ReleaseError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ota_core::UrlPrefixBlobStore;
    use ota_state::{NewDeployment, NewRelease};

    fn assembler(store: &StateStore) -> ReleaseAssembler {
        ReleaseAssembler::new(
            store.clone(),
            Arc::new(UrlPrefixBlobStore::new("https://cdn.example.com")),
        )
    }

    fn release(deployment_id: u64, user: u64, hash: &str) -> NewRelease {
        NewRelease {
            deployment_id,
            app_version: "1.0.0".to_string(),
            description: Some("fix crash".to_string()),
            package_hash: hash.to_string(),
            blob_url: format!("bundles/{hash}"),
            manifest_blob_url: format!("manifests/{hash}"),
            size: 2048,
            is_mandatory: true,
            release_method: ReleaseMethod::Upload,
            original_label: None,
            original_deployment: None,
            released_by: user,
        }
    }

    fn seeded() -> (StateStore, u64, u64) {
        let store = StateStore::open_in_memory().unwrap();
        let user = store.create_user("dev@example.com", "abcdefghi").unwrap();
        let deployment = store
            .insert_deployment(&NewDeployment {
                app_id: 1,
                name: "Production".to_string(),
                deployment_key: "key".to_string(),
            })
            .unwrap();
        (store, deployment.id, user.id)
    }

    #[tokio::test]
    async fn missing_package_is_none() {
        let (store, _, _) = seeded();
        assert!(assembler(&store).describe_package(404).await.unwrap().is_none());
        assert!(assembler(&store).describe_version(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn descriptor_carries_every_field() {
        let (store, deployment_id, user_id) = seeded();
        let package = store.record_release(&release(deployment_id, user_id, "h1")).unwrap();

        let descriptor = assembler(&store)
            .describe_package(package.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(descriptor.description.as_deref(), Some("fix crash"));
        assert!(!descriptor.is_disabled);
        assert!(descriptor.is_mandatory);
        assert_eq!(descriptor.rollout, 100);
        assert_eq!(descriptor.app_version.as_deref(), Some("1.0.0"));
        assert_eq!(descriptor.package_hash, "h1");
        assert_eq!(descriptor.blob_url, "https://cdn.example.com/bundles/h1");
        assert_eq!(descriptor.manifest_blob_url, "https://cdn.example.com/manifests/h1");
        assert_eq!(descriptor.size, 2048);
        assert!(descriptor.diff_package_map.is_none());
        assert_eq!(descriptor.release_method, ReleaseMethod::Upload);
        assert_eq!(descriptor.upload_time, package.updated_at);
        assert_eq!(descriptor.label, "v1");
        assert_eq!(descriptor.released_by.as_deref(), Some("dev@example.com"));
    }

    #[tokio::test]
    async fn diff_map_is_keyed_by_source_hash() {
        let (store, deployment_id, user_id) = seeded();
        store.record_release(&release(deployment_id, user_id, "h1")).unwrap();
        store.record_release(&release(deployment_id, user_id, "h2")).unwrap();
        let latest = store.record_release(&release(deployment_id, user_id, "h3")).unwrap();
        store.add_diff(latest.id, "h1", "diffs/h1-h3", 100).unwrap();
        store.add_diff(latest.id, "h2", "diffs/h2-h3", 50).unwrap();

        let descriptor = assembler(&store)
            .describe_package(latest.id)
            .await
            .unwrap()
            .unwrap();
        let map = descriptor.diff_package_map.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map["h1"],
            DiffPackage {
                size: 100,
                url: "https://cdn.example.com/diffs/h1-h3".to_string()
            }
        );
        assert_eq!(map["h2"].size, 50);
    }

    #[tokio::test]
    async fn describe_version_follows_current_package() {
        let (store, deployment_id, user_id) = seeded();
        store.record_release(&release(deployment_id, user_id, "h1")).unwrap();
        let second = store.record_release(&release(deployment_id, user_id, "h2")).unwrap();

        let descriptor = assembler(&store)
            .describe_version(second.deployment_version_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.package_hash, "h2");
        assert_eq!(descriptor.label, "v2");
    }

    #[tokio::test]
    async fn absent_user_is_null_not_empty() {
        let (store, deployment_id, _) = seeded();
        let package = store.record_release(&release(deployment_id, 999, "h1")).unwrap();
        let descriptor = assembler(&store)
            .describe_package(package.id)
            .await
            .unwrap()
            .unwrap();
        assert!(descriptor.released_by.is_none());
    }

    #[test]
    fn wire_field_names() {
        let (store, _, _) = seeded();
        let descriptor = assembler(&store).assemble(
            Package {
                id: 1,
                deployment_id: 1,
                deployment_version_id: 1,
                description: None,
                package_hash: "h".to_string(),
                blob_url: "b".to_string(),
                manifest_blob_url: "m".to_string(),
                size: 1,
                is_mandatory: false,
                release_method: ReleaseMethod::Promote,
                label: "v1".to_string(),
                original_label: Some("v7".to_string()),
                original_deployment: Some("Staging".to_string()),
                released_by: 1,
                created_at: 5,
                updated_at: 6,
            },
            Vec::new(),
            None,
            None,
        );
        let json = serde_json::to_value(&descriptor).unwrap();
        for field in [
            "description",
            "isDisabled",
            "isMandatory",
            "rollout",
            "appVersion",
            "packageHash",
            "blobUrl",
            "size",
            "manifestBlobUrl",
            "diffPackageMap",
            "releaseMethod",
            "uploadTime",
            "originalLabel",
            "originalDeployment",
            "label",
            "releasedBy",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert!(json["diffPackageMap"].is_null());
        assert!(json["appVersion"].is_null());
        assert_eq!(json["releaseMethod"], "Promote");
        assert_eq!(json["uploadTime"], 6);
        assert_eq!(json["originalDeployment"], "Staging");
    }
}
