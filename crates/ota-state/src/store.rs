//! redb-backed state persistence for the OTA release backend.
//!
//! Reads open their own read transaction. Writes go through
//! [`StateStore::transaction`] so that multi-row mutations commit or roll
//! back as a unit. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::rows::{decode, get_row, scan_desc};
use crate::tables::*;
use crate::txn::{PurgeReport, WriteTxn};
use crate::types::*;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.open_table(DEPLOYMENT_NAMES).map_err(map_err!(Table))?;
        txn.open_table(DEPLOYMENT_KEYS).map_err(map_err!(Table))?;
        for table in [
            USERS,
            DEPLOYMENTS,
            DEPLOYMENT_VERSIONS,
            PACKAGES,
            PACKAGE_DIFFS,
            PACKAGE_METRICS,
            DEPLOYMENT_HISTORY,
        ] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run `f` inside one write transaction.
    ///
    /// Commits when `f` returns `Ok`; aborts (discarding every write made
    /// through the [`WriteTxn`]) when it returns `Err`.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTxn) -> Result<T, E>,
        E: From<StateError>,
    {
        let txn = WriteTxn::new(self.db.begin_write().map_err(map_err!(Transaction))?);
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "transaction abort failed");
                }
                debug!("transaction rolled back");
                Err(e)
            }
        }
    }

    // ── Read helpers ───────────────────────────────────────────────

    fn read_row<T: DeserializeOwned>(
        &self,
        def: redb::TableDefinition<'static, u64, &'static [u8]>,
        id: u64,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        get_row(&table, id)
    }

    fn read_scan<T: DeserializeOwned>(
        &self,
        def: redb::TableDefinition<'static, u64, &'static [u8]>,
        limit: usize,
        keep: impl FnMut(&T) -> bool,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        scan_desc(&table, limit, keep)
    }

    fn read_index(
        &self,
        def: redb::TableDefinition<'static, &'static str, u64>,
        key: &str,
    ) -> StateResult<Option<u64>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let id = table.get(key).map_err(map_err!(Read))?.map(|guard| guard.value());
        Ok(id)
    }

    // ── Users ──────────────────────────────────────────────────────

    pub fn create_user(&self, email: &str, identical: &str) -> StateResult<User> {
        self.transaction(|tx| tx.create_user(email, identical))
    }

    pub fn get_user(&self, id: UserId) -> StateResult<Option<User>> {
        self.read_row(USERS, id)
    }

    // ── Deployments ────────────────────────────────────────────────

    pub fn get_deployment(&self, id: DeploymentId) -> StateResult<Option<Deployment>> {
        self.read_row(DEPLOYMENTS, id)
    }

    pub fn find_deployment_by_name(
        &self,
        app_id: AppId,
        name: &str,
    ) -> StateResult<Option<Deployment>> {
        match self.read_index(DEPLOYMENT_NAMES, &name_key(app_id, name))? {
            Some(id) => self.get_deployment(id),
            None => Ok(None),
        }
    }

    /// Look up the live deployment holding `key`.
    pub fn find_deployment_by_key(&self, key: &str) -> StateResult<Option<Deployment>> {
        match self.read_index(DEPLOYMENT_KEYS, key)? {
            Some(id) => self.get_deployment(id),
            None => Ok(None),
        }
    }

    /// All deployments of an application, oldest first.
    pub fn list_deployments(&self, app_id: AppId) -> StateResult<Vec<Deployment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let deployment: Deployment = decode(value.value())?;
            if deployment.app_id == app_id {
                results.push(deployment);
            }
        }
        Ok(results)
    }

    // ── Versions, packages, diffs ──────────────────────────────────

    pub fn get_deployment_version(
        &self,
        id: DeploymentVersionId,
    ) -> StateResult<Option<DeploymentVersion>> {
        self.read_row(DEPLOYMENT_VERSIONS, id)
    }

    /// Most recent version rows of a deployment, newest first.
    pub fn list_deployment_versions(
        &self,
        deployment_id: DeploymentId,
        limit: usize,
    ) -> StateResult<Vec<DeploymentVersion>> {
        self.read_scan(DEPLOYMENT_VERSIONS, limit, |v: &DeploymentVersion| {
            v.deployment_id == deployment_id
        })
    }

    pub fn get_package(&self, id: PackageId) -> StateResult<Option<Package>> {
        self.read_row(PACKAGES, id)
    }

    /// Most recent packages of a deployment, newest first.
    pub fn list_packages(
        &self,
        deployment_id: DeploymentId,
        limit: usize,
    ) -> StateResult<Vec<Package>> {
        self.read_scan(PACKAGES, limit, |p: &Package| p.deployment_id == deployment_id)
    }

    /// Diffs whose target is `package_id`.
    pub fn list_diffs_for_package(&self, package_id: PackageId) -> StateResult<Vec<PackageDiff>> {
        self.read_scan(PACKAGE_DIFFS, usize::MAX, |d: &PackageDiff| {
            d.package_id == package_id
        })
    }

    /// Diffs that start from the package hashed `hash`.
    pub fn list_diffs_from_hash(&self, hash: &str) -> StateResult<Vec<PackageDiff>> {
        self.read_scan(PACKAGE_DIFFS, usize::MAX, |d: &PackageDiff| {
            d.diff_against_package_hash == hash
        })
    }

    pub fn list_metrics_for_package(
        &self,
        package_id: PackageId,
    ) -> StateResult<Vec<PackageMetrics>> {
        self.read_scan(PACKAGE_METRICS, usize::MAX, |m: &PackageMetrics| {
            m.package_id == package_id
        })
    }

    /// Most recent history entries of a deployment, newest first.
    pub fn list_history(
        &self,
        deployment_id: DeploymentId,
        limit: usize,
    ) -> StateResult<Vec<DeploymentHistory>> {
        self.read_scan(DEPLOYMENT_HISTORY, limit, |h: &DeploymentHistory| {
            h.deployment_id == deployment_id
        })
    }

    // ── Mutations ──────────────────────────────────────────────────

    pub fn insert_deployment(&self, new: &NewDeployment) -> StateResult<Deployment> {
        self.transaction(|tx| tx.insert_deployment(new))
    }

    pub fn record_release(&self, release: &NewRelease) -> StateResult<Package> {
        self.transaction(|tx| tx.record_release(release))
    }

    pub fn add_diff(
        &self,
        package_id: PackageId,
        against_hash: &str,
        diff_blob_url: &str,
        diff_size: u64,
    ) -> StateResult<PackageDiff> {
        self.transaction(|tx| tx.add_diff(package_id, against_hash, diff_blob_url, diff_size))
    }

    /// Purge up to `cap` rows per record family for a deployment, atomically.
    pub fn purge_history(&self, deployment_id: DeploymentId, cap: usize) -> StateResult<PurgeReport> {
        let report = self.transaction(|tx| tx.purge_history(deployment_id, cap))?;
        debug!(deployment_id, ?report, "deployment history purged");
        Ok(report)
    }
}
