//! Domain types for the OTA state store.
//!
//! These types are the persisted rows of every record family. All types are
//! serializable to/from JSON for storage in redb tables. Timestamps are
//! milliseconds since the Unix epoch.

use ota_core::ReleaseMethod;
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type AppId = u64;
pub type DeploymentId = u64;
pub type DeploymentVersionId = u64;
pub type PackageId = u64;

// ── User ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Short random token appended to every deployment key this user creates.
    pub identical: String,
    pub created_at: u64,
}

// ── Deployment ────────────────────────────────────────────────────

/// A release channel within an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub id: DeploymentId,
    pub app_id: AppId,
    pub name: String,
    pub deployment_key: String,
    /// Version currently served to clients; 0 when nothing has been released.
    pub last_deployment_version_id: DeploymentVersionId,
    /// Number of labels issued so far.
    pub label_id: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Fields supplied when creating a deployment.
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub app_id: AppId,
    pub name: String,
    pub deployment_key: String,
}

// ── Deployment version ────────────────────────────────────────────

/// The package served to clients running one app version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentVersion {
    pub id: DeploymentVersionId,
    pub deployment_id: DeploymentId,
    pub app_version: String,
    pub current_package_id: PackageId,
    pub created_at: u64,
}

// ── Package ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: PackageId,
    pub deployment_id: DeploymentId,
    pub deployment_version_id: DeploymentVersionId,
    pub description: Option<String>,
    pub package_hash: String,
    pub blob_url: String,
    pub manifest_blob_url: String,
    pub size: u64,
    pub is_mandatory: bool,
    pub release_method: ReleaseMethod,
    pub label: String,
    /// Label in the deployment this package was promoted from.
    pub original_label: Option<String>,
    /// Name of the deployment this package was promoted from.
    pub original_deployment: Option<String>,
    pub released_by: UserId,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Fields supplied when publishing a package.
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub deployment_id: DeploymentId,
    pub app_version: String,
    pub description: Option<String>,
    pub package_hash: String,
    pub blob_url: String,
    pub manifest_blob_url: String,
    pub size: u64,
    pub is_mandatory: bool,
    pub release_method: ReleaseMethod,
    pub original_label: Option<String>,
    pub original_deployment: Option<String>,
    pub released_by: UserId,
}

/// A precomputed delta from an older package (by hash) to `package_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDiff {
    pub id: u64,
    pub package_id: PackageId,
    pub diff_against_package_hash: String,
    pub diff_blob_url: String,
    pub diff_size: u64,
}

/// Client-reported counters for one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageMetrics {
    pub id: u64,
    pub package_id: PackageId,
    pub active: u64,
    pub downloaded: u64,
    pub failed: u64,
    pub installed: u64,
}

// ── History ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentHistory {
    pub id: u64,
    pub deployment_id: DeploymentId,
    pub package_id: PackageId,
    pub created_at: u64,
}
