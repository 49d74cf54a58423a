//! Write transactions.
//!
//! A [`WriteTxn`] wraps one redb write transaction. Every method opens the
//! tables it needs and closes them before returning, so methods compose
//! freely inside a single [`StateStore::transaction`](crate::StateStore::transaction)
//! closure and commit or roll back together.

use ota_core::now_millis;
use redb::{ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::rows::{encode, get_row, scan_desc};
use crate::tables::*;
use crate::types::*;

type RowTable = TableDefinition<'static, u64, &'static [u8]>;
type IndexTable = TableDefinition<'static, &'static str, u64>;

/// Rows touched by a history purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Whether the deployment's served-version and label pointers were reset.
    pub deployment_reset: bool,
    pub history: usize,
    pub versions: usize,
    pub packages: usize,
    pub metrics: usize,
    pub diffs: usize,
}

impl PurgeReport {
    pub fn rows_deleted(&self) -> usize {
        self.history + self.versions + self.packages + self.metrics + self.diffs
    }

    /// True once there is nothing left to purge.
    pub fn is_empty(&self) -> bool {
        self.rows_deleted() == 0
    }
}

/// Child rows removed alongside one package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageRemoval {
    pub metrics: usize,
    pub diffs: usize,
}

pub struct WriteTxn {
    txn: WriteTransaction,
}

impl WriteTxn {
    pub(crate) fn new(txn: WriteTransaction) -> Self {
        Self { txn }
    }

    pub(crate) fn commit(self) -> StateResult<()> {
        self.txn.commit().map_err(map_err!(Transaction))
    }

    pub(crate) fn abort(self) -> StateResult<()> {
        self.txn.abort().map_err(map_err!(Transaction))
    }

    // ── Row primitives ─────────────────────────────────────────────

    fn next_id(&self, family: &str) -> StateResult<u64> {
        let mut table = self.txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        let current = table
            .get(family)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(family, next).map_err(map_err!(Write))?;
        Ok(next)
    }

    fn get<T: DeserializeOwned>(&self, def: RowTable, id: u64) -> StateResult<Option<T>> {
        let table = self.txn.open_table(def).map_err(map_err!(Table))?;
        get_row(&table, id)
    }

    fn put<T: Serialize>(&self, def: RowTable, id: u64, row: &T) -> StateResult<()> {
        let value = encode(row)?;
        let mut table = self.txn.open_table(def).map_err(map_err!(Table))?;
        table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
        Ok(())
    }

    fn remove(&self, def: RowTable, id: u64) -> StateResult<bool> {
        let mut table = self.txn.open_table(def).map_err(map_err!(Table))?;
        let existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        Ok(existed)
    }

    fn scan<T: DeserializeOwned>(
        &self,
        def: RowTable,
        limit: usize,
        keep: impl FnMut(&T) -> bool,
    ) -> StateResult<Vec<T>> {
        let table = self.txn.open_table(def).map_err(map_err!(Table))?;
        scan_desc(&table, limit, keep)
    }

    fn index_get(&self, def: IndexTable, key: &str) -> StateResult<Option<u64>> {
        let table = self.txn.open_table(def).map_err(map_err!(Table))?;
        let id = table.get(key).map_err(map_err!(Read))?.map(|guard| guard.value());
        Ok(id)
    }

    fn index_put(&self, def: IndexTable, key: &str, id: u64) -> StateResult<()> {
        let mut table = self.txn.open_table(def).map_err(map_err!(Table))?;
        table.insert(key, id).map_err(map_err!(Write))?;
        Ok(())
    }

    fn index_remove(&self, def: IndexTable, key: &str) -> StateResult<bool> {
        let mut table = self.txn.open_table(def).map_err(map_err!(Table))?;
        let existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        Ok(existed)
    }

    // ── Users ──────────────────────────────────────────────────────

    pub fn user(&self, id: UserId) -> StateResult<Option<User>> {
        self.get(USERS, id)
    }

    pub fn create_user(&self, email: &str, identical: &str) -> StateResult<User> {
        let user = User {
            id: self.next_id("users")?,
            email: email.to_string(),
            identical: identical.to_string(),
            created_at: now_millis(),
        };
        self.put(USERS, user.id, &user)?;
        debug!(user_id = user.id, "user stored");
        Ok(user)
    }

    // ── Deployments ────────────────────────────────────────────────

    pub fn deployment(&self, id: DeploymentId) -> StateResult<Option<Deployment>> {
        self.get(DEPLOYMENTS, id)
    }

    pub fn deployment_by_name(
        &self,
        app_id: AppId,
        name: &str,
    ) -> StateResult<Option<Deployment>> {
        match self.index_get(DEPLOYMENT_NAMES, &name_key(app_id, name))? {
            Some(id) => self.deployment(id),
            None => Ok(None),
        }
    }

    /// Whether `key` was ever issued, including keys of deleted deployments.
    pub fn key_in_use(&self, key: &str) -> StateResult<bool> {
        Ok(self.index_get(DEPLOYMENT_KEYS, key)?.is_some())
    }

    pub fn insert_deployment(&self, new: &NewDeployment) -> StateResult<Deployment> {
        let index_key = name_key(new.app_id, &new.name);
        if self.index_get(DEPLOYMENT_NAMES, &index_key)?.is_some() {
            return Err(StateError::Conflict(format!("{} already exists", new.name)));
        }
        if self.key_in_use(&new.deployment_key)? {
            return Err(StateError::Conflict("deployment key already issued".to_string()));
        }

        let now = now_millis();
        let deployment = Deployment {
            id: self.next_id("deployments")?,
            app_id: new.app_id,
            name: new.name.clone(),
            deployment_key: new.deployment_key.clone(),
            last_deployment_version_id: 0,
            label_id: 0,
            created_at: now,
            updated_at: now,
        };
        self.put(DEPLOYMENTS, deployment.id, &deployment)?;
        self.index_put(DEPLOYMENT_NAMES, &index_key, deployment.id)?;
        self.index_put(DEPLOYMENT_KEYS, &deployment.deployment_key, deployment.id)?;
        debug!(deployment_id = deployment.id, app_id = new.app_id, "deployment stored");
        Ok(deployment)
    }

    /// Rename a deployment. `Ok(None)` when no deployment matched.
    pub fn rename_deployment(
        &self,
        app_id: AppId,
        name: &str,
        new_name: &str,
    ) -> StateResult<Option<Deployment>> {
        if self.index_get(DEPLOYMENT_NAMES, &name_key(app_id, new_name))?.is_some() {
            return Err(StateError::Conflict(format!("{new_name} already exists")));
        }
        let Some(mut deployment) = self.deployment_by_name(app_id, name)? else {
            return Ok(None);
        };
        deployment.name = new_name.to_string();
        deployment.updated_at = now_millis();
        self.put(DEPLOYMENTS, deployment.id, &deployment)?;
        self.index_remove(DEPLOYMENT_NAMES, &name_key(app_id, name))?;
        self.index_put(DEPLOYMENT_NAMES, &name_key(app_id, new_name), deployment.id)?;
        Ok(Some(deployment))
    }

    /// Remove a deployment and every row it owns. `Ok(None)` when no
    /// deployment matched. The key stays reserved.
    pub fn remove_deployment(
        &self,
        app_id: AppId,
        name: &str,
    ) -> StateResult<Option<(Deployment, PurgeReport)>> {
        let Some(deployment) = self.deployment_by_name(app_id, name)? else {
            return Ok(None);
        };
        let report = self.purge_history(deployment.id, usize::MAX)?;
        self.remove(DEPLOYMENTS, deployment.id)?;
        self.index_remove(DEPLOYMENT_NAMES, &name_key(app_id, name))?;
        debug!(deployment_id = deployment.id, ?report, "deployment removed");
        Ok(Some((deployment, report)))
    }

    // ── Releases ───────────────────────────────────────────────────

    pub fn package(&self, id: PackageId) -> StateResult<Option<Package>> {
        self.get(PACKAGES, id)
    }

    /// Publish a package: upsert the app-version row, issue the next label,
    /// create the metrics row, append history and move the served pointer.
    pub fn record_release(&self, release: &NewRelease) -> StateResult<Package> {
        let mut deployment = self
            .deployment(release.deployment_id)?
            .ok_or_else(|| StateError::NotFound(format!("deployment {}", release.deployment_id)))?;
        let now = now_millis();
        let package_id = self.next_id("packages")?;

        let existing: Vec<DeploymentVersion> =
            self.scan(DEPLOYMENT_VERSIONS, 1, |v: &DeploymentVersion| {
                v.deployment_id == deployment.id && v.app_version == release.app_version
            })?;
        let version = match existing.into_iter().next() {
            Some(mut version) => {
                version.current_package_id = package_id;
                version
            }
            None => DeploymentVersion {
                id: self.next_id("deployment_versions")?,
                deployment_id: deployment.id,
                app_version: release.app_version.clone(),
                current_package_id: package_id,
                created_at: now,
            },
        };
        self.put(DEPLOYMENT_VERSIONS, version.id, &version)?;

        deployment.label_id += 1;
        deployment.last_deployment_version_id = version.id;
        deployment.updated_at = now;
        self.put(DEPLOYMENTS, deployment.id, &deployment)?;

        let package = Package {
            id: package_id,
            deployment_id: deployment.id,
            deployment_version_id: version.id,
            description: release.description.clone(),
            package_hash: release.package_hash.clone(),
            blob_url: release.blob_url.clone(),
            manifest_blob_url: release.manifest_blob_url.clone(),
            size: release.size,
            is_mandatory: release.is_mandatory,
            release_method: release.release_method,
            label: format!("v{}", deployment.label_id),
            original_label: release.original_label.clone(),
            original_deployment: release.original_deployment.clone(),
            released_by: release.released_by,
            created_at: now,
            updated_at: now,
        };
        self.put(PACKAGES, package.id, &package)?;

        let metrics = PackageMetrics {
            id: self.next_id("package_metrics")?,
            package_id: package.id,
            ..Default::default()
        };
        self.put(PACKAGE_METRICS, metrics.id, &metrics)?;

        self.append_history(deployment.id, package.id)?;

        debug!(
            deployment_id = deployment.id,
            package_id = package.id,
            label = %package.label,
            "release recorded"
        );
        Ok(package)
    }

    /// Record that `package_id` was served by the deployment.
    pub fn append_history(
        &self,
        deployment_id: DeploymentId,
        package_id: PackageId,
    ) -> StateResult<DeploymentHistory> {
        let entry = DeploymentHistory {
            id: self.next_id("deployment_history")?,
            deployment_id,
            package_id,
            created_at: now_millis(),
        };
        self.put(DEPLOYMENT_HISTORY, entry.id, &entry)?;
        Ok(entry)
    }

    /// Register a delta from the package hashed `against_hash` to `package_id`.
    pub fn add_diff(
        &self,
        package_id: PackageId,
        against_hash: &str,
        diff_blob_url: &str,
        diff_size: u64,
    ) -> StateResult<PackageDiff> {
        if self.package(package_id)?.is_none() {
            return Err(StateError::NotFound(format!("package {package_id}")));
        }
        let diff = PackageDiff {
            id: self.next_id("package_diffs")?,
            package_id,
            diff_against_package_hash: against_hash.to_string(),
            diff_blob_url: diff_blob_url.to_string(),
            diff_size,
        };
        self.put(PACKAGE_DIFFS, diff.id, &diff)?;
        Ok(diff)
    }

    // ── History purge ──────────────────────────────────────────────

    /// Zero the served-version and label pointers. False if the deployment
    /// does not exist.
    pub fn reset_deployment_pointers(&self, deployment_id: DeploymentId) -> StateResult<bool> {
        let Some(mut deployment) = self.deployment(deployment_id)? else {
            return Ok(false);
        };
        deployment.last_deployment_version_id = 0;
        deployment.label_id = 0;
        deployment.updated_at = now_millis();
        self.put(DEPLOYMENTS, deployment.id, &deployment)?;
        Ok(true)
    }

    /// Delete up to `cap` of the deployment's most recent history rows.
    pub fn delete_recent_history(
        &self,
        deployment_id: DeploymentId,
        cap: usize,
    ) -> StateResult<usize> {
        let rows: Vec<DeploymentHistory> =
            self.scan(DEPLOYMENT_HISTORY, cap, |h: &DeploymentHistory| {
                h.deployment_id == deployment_id
            })?;
        for row in &rows {
            self.remove(DEPLOYMENT_HISTORY, row.id)?;
        }
        Ok(rows.len())
    }

    /// Delete up to `cap` of the deployment's most recent version rows.
    pub fn delete_recent_versions(
        &self,
        deployment_id: DeploymentId,
        cap: usize,
    ) -> StateResult<usize> {
        let rows: Vec<DeploymentVersion> =
            self.scan(DEPLOYMENT_VERSIONS, cap, |v: &DeploymentVersion| {
                v.deployment_id == deployment_id
            })?;
        for row in &rows {
            self.remove(DEPLOYMENT_VERSIONS, row.id)?;
        }
        Ok(rows.len())
    }

    /// The deployment's `cap` most recent packages, newest first.
    pub fn recent_packages(
        &self,
        deployment_id: DeploymentId,
        cap: usize,
    ) -> StateResult<Vec<Package>> {
        self.scan(PACKAGES, cap, |p: &Package| p.deployment_id == deployment_id)
    }

    /// Delete a package row with its metrics and diffs.
    ///
    /// Diffs go when they target the package, or when they start from its
    /// hash and target a package of the same deployment (or one already gone).
    pub fn delete_package(&self, package: &Package) -> StateResult<PackageRemoval> {
        self.remove(PACKAGES, package.id)?;

        let metrics: Vec<PackageMetrics> =
            self.scan(PACKAGE_METRICS, usize::MAX, |m: &PackageMetrics| {
                m.package_id == package.id
            })?;
        for row in &metrics {
            self.remove(PACKAGE_METRICS, row.id)?;
        }

        let candidates: Vec<PackageDiff> =
            self.scan(PACKAGE_DIFFS, usize::MAX, |d: &PackageDiff| {
                d.package_id == package.id || d.diff_against_package_hash == package.package_hash
            })?;
        let mut diffs = 0;
        for diff in &candidates {
            let owned = diff.package_id == package.id
                || self
                    .package(diff.package_id)?
                    .is_none_or(|target| target.deployment_id == package.deployment_id);
            if owned {
                self.remove(PACKAGE_DIFFS, diff.id)?;
                diffs += 1;
            }
        }

        Ok(PackageRemoval {
            metrics: metrics.len(),
            diffs,
        })
    }

    /// Run every purge branch for one deployment, each bounded by `cap`.
    pub fn purge_history(
        &self,
        deployment_id: DeploymentId,
        cap: usize,
    ) -> StateResult<PurgeReport> {
        let mut report = PurgeReport {
            deployment_reset: self.reset_deployment_pointers(deployment_id)?,
            history: self.delete_recent_history(deployment_id, cap)?,
            versions: self.delete_recent_versions(deployment_id, cap)?,
            ..Default::default()
        };
        for package in self.recent_packages(deployment_id, cap)? {
            let removal = self.delete_package(&package)?;
            report.packages += 1;
            report.metrics += removal.metrics;
            report.diffs += removal.diffs;
        }
        Ok(report)
    }
}
