//! Deployment lifecycle.
//!
//! [`DeploymentManager`] owns every mutation of a deployment and its release
//! history. Mutations run inside one store transaction each; reads that
//! resolve descriptors are async and go through the [`ReleaseAssembler`].

use std::sync::Arc;

use ota_core::BlobStore;
use ota_core::config::HistoryConfig;
use ota_state::{
    AppId, Deployment, DeploymentId, NewDeployment, NewRelease, Package, PackageDiff, PackageId,
    PurgeReport, StateError, StateStore, User, UserId, WriteTxn,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::descriptor::{PackageDescriptor, ReleaseAssembler, blocking};
use crate::error::{ReleaseError, ReleaseResult};
use crate::token::{KEY_TOKEN_LEN, TokenGenerator};

/// Fresh tokens tried before giving up on issuing a unique key.
const MAX_KEY_ATTEMPTS: usize = 8;

/// One row of a deployment listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub created_time: u64,
    pub id: String,
    pub key: String,
    pub name: String,
    /// The release currently served, or `None` before the first release.
    pub package: Option<PackageDescriptor>,
}

#[derive(Clone)]
pub struct DeploymentManager {
    store: StateStore,
    assembler: ReleaseAssembler,
    tokens: Arc<dyn TokenGenerator>,
    history_limit: usize,
    purge_batch: usize,
}

impl DeploymentManager {
    pub fn new(
        store: StateStore,
        blobs: Arc<dyn BlobStore>,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        Self::with_config(store, blobs, tokens, &HistoryConfig::default())
    }

    pub fn with_config(
        store: StateStore,
        blobs: Arc<dyn BlobStore>,
        tokens: Arc<dyn TokenGenerator>,
        history: &HistoryConfig,
    ) -> Self {
        Self {
            assembler: ReleaseAssembler::new(store.clone(), blobs),
            store,
            tokens,
            history_limit: history.limit,
            purge_batch: history.purge_batch.max(1),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn assembler(&self) -> &ReleaseAssembler {
        &self.assembler
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Create a deployment owned by `app_id`, keyed for `creator`.
    pub fn create(&self, name: &str, app_id: AppId, creator: UserId) -> ReleaseResult<Deployment> {
        let deployment = self.store.transaction(|tx| {
            let user = tx.user(creator)?.ok_or(ReleaseError::UserNotFound(creator))?;
            if tx.deployment_by_name(app_id, name)?.is_some() {
                return Err(ReleaseError::DuplicateName(name.to_string()));
            }
            let deployment_key = self.issue_key(tx, &user)?;
            let deployment = tx.insert_deployment(&NewDeployment {
                app_id,
                name: name.to_string(),
                deployment_key,
            })?;
            Ok(deployment)
        })?;
        info!(deployment_id = deployment.id, app_id, name, "deployment created");
        Ok(deployment)
    }

    fn issue_key(&self, tx: &WriteTxn, user: &User) -> ReleaseResult<String> {
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let key = format!("{}{}", self.tokens.token(KEY_TOKEN_LEN)?, user.identical);
            if !tx.key_in_use(&key)? {
                return Ok(key);
            }
            debug!(attempt, "deployment key collision, regenerating");
        }
        Err(ReleaseError::Token(format!(
            "no unique deployment key after {MAX_KEY_ATTEMPTS} attempts"
        )))
    }

    pub fn rename(&self, name: &str, app_id: AppId, new_name: &str) -> ReleaseResult<Deployment> {
        match self
            .store
            .transaction(|tx| tx.rename_deployment(app_id, name, new_name))
        {
            Ok(Some(deployment)) => {
                info!(deployment_id = deployment.id, from = name, to = new_name, "deployment renamed");
                Ok(deployment)
            }
            Ok(None) => Err(ReleaseError::NotFound(name.to_string())),
            Err(StateError::Conflict(_)) => Err(ReleaseError::DuplicateName(new_name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a deployment together with every row it owns.
    pub fn delete(&self, name: &str, app_id: AppId) -> ReleaseResult<PurgeReport> {
        let removed = self
            .store
            .transaction(|tx| tx.remove_deployment(app_id, name))
            .map_err(|e| {
                warn!(app_id, name, error = %e, "deployment delete rolled back");
                ReleaseError::Transaction(e)
            })?;
        let Some((deployment, report)) = removed else {
            return Err(ReleaseError::NotFound(name.to_string()));
        };
        info!(
            deployment_id = deployment.id,
            app_id,
            name,
            rows = report.rows_deleted(),
            "deployment deleted"
        );
        Ok(report)
    }

    /// Publish a package to a deployment.
    pub fn release(&self, release: &NewRelease) -> ReleaseResult<Package> {
        let package = self.store.record_release(release)?;
        info!(
            deployment_id = package.deployment_id,
            package_id = package.id,
            label = %package.label,
            method = package.release_method.as_str(),
            "package released"
        );
        Ok(package)
    }

    /// Register a delta that upgrades `against_hash` to `package_id`.
    pub fn add_diff(
        &self,
        package_id: PackageId,
        against_hash: &str,
        diff_blob_url: &str,
        diff_size: u64,
    ) -> ReleaseResult<PackageDiff> {
        let diff = self
            .store
            .add_diff(package_id, against_hash, diff_blob_url, diff_size)?;
        debug!(package_id, against_hash, "diff registered");
        Ok(diff)
    }

    /// Remove one batch of a deployment's release history.
    ///
    /// Everything in the batch commits together or not at all. Call again
    /// until the returned report is empty.
    pub fn purge_history(&self, deployment_id: DeploymentId) -> ReleaseResult<PurgeReport> {
        let report = self
            .store
            .purge_history(deployment_id, self.purge_batch)
            .map_err(|e| {
                warn!(deployment_id, error = %e, "history purge rolled back");
                ReleaseError::Transaction(e)
            })?;
        info!(deployment_id, rows = report.rows_deleted(), "history purged");
        Ok(report)
    }

    /// Purge batches until nothing is left; returns the summed report.
    pub fn purge_all(&self, deployment_id: DeploymentId) -> ReleaseResult<PurgeReport> {
        let mut total = PurgeReport::default();
        loop {
            let batch = self.purge_history(deployment_id)?;
            if batch.is_empty() {
                total.deployment_reset |= batch.deployment_reset;
                return Ok(total);
            }
            total.deployment_reset |= batch.deployment_reset;
            total.history += batch.history;
            total.versions += batch.versions;
            total.packages += batch.packages;
            total.metrics += batch.metrics;
            total.diffs += batch.diffs;
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn find(&self, name: &str, app_id: AppId) -> ReleaseResult<Option<Deployment>> {
        Ok(self.store.find_deployment_by_name(app_id, name)?)
    }

    pub fn find_by_key(&self, key: &str) -> ReleaseResult<Option<Deployment>> {
        Ok(self.store.find_deployment_by_key(key)?)
    }

    /// Ids of every package released to the deployment, newest first.
    pub fn package_ids(&self, deployment_id: DeploymentId) -> ReleaseResult<Vec<PackageId>> {
        let packages = self.store.list_packages(deployment_id, usize::MAX)?;
        Ok(packages.into_iter().map(|p| p.id).collect())
    }

    /// Deployments of an application with the release each currently serves.
    pub async fn list(&self, app_id: AppId) -> ReleaseResult<Vec<DeploymentSummary>> {
        let store = self.store.clone();
        let deployments = blocking(move || store.list_deployments(app_id)).await?;

        let mut summaries = Vec::with_capacity(deployments.len());
        for deployment in deployments {
            let package = match deployment.last_deployment_version_id {
                0 => None,
                version_id => self.assembler.describe_version(version_id).await?,
            };
            summaries.push(DeploymentSummary {
                created_time: deployment.created_at,
                id: deployment.id.to_string(),
                key: deployment.deployment_key,
                name: deployment.name,
                package,
            });
        }
        Ok(summaries)
    }

    /// Most recent releases of a deployment, newest first.
    ///
    /// An entry whose package no longer exists resolves to `None`.
    pub async fn history(
        &self,
        deployment_id: DeploymentId,
        limit: Option<usize>,
    ) -> ReleaseResult<Vec<Option<PackageDescriptor>>> {
        let limit = limit.unwrap_or(self.history_limit);
        let store = self.store.clone();
        let entries = blocking(move || store.list_history(deployment_id, limit)).await?;

        let mut descriptors = Vec::with_capacity(entries.len());
        for entry in entries {
            descriptors.push(self.assembler.describe_package(entry.package_id).await?);
        }
        Ok(descriptors)
    }
}
