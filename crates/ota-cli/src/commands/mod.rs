pub mod deployment;
pub mod hash;
pub mod release;
pub mod user;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use ota_core::{OtaConfig, UrlPrefixBlobStore};
use ota_release::{DeploymentManager, RandomTokenGenerator, ReleaseError};
use ota_state::{AppId, Deployment, StateStore};

/// Settings shared by every command.
pub struct Context {
    pub config: OtaConfig,
}

impl Context {
    pub fn load(config_path: &Path, db: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = OtaConfig::load_or_default(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        if let Some(db) = db {
            config.storage.path = db;
        }
        Ok(Self { config })
    }

    pub fn store(&self) -> anyhow::Result<StateStore> {
        let path = &self.config.storage.path;
        StateStore::open(path).with_context(|| format!("Failed to open {}", path.display()))
    }

    pub fn manager(&self) -> anyhow::Result<DeploymentManager> {
        Ok(DeploymentManager::with_config(
            self.store()?,
            Arc::new(UrlPrefixBlobStore::new(&self.config.blob.download_url)),
            Arc::new(RandomTokenGenerator),
            &self.config.history,
        ))
    }
}

/// Resolve a deployment by name or fail with the lifecycle's not-found error.
pub fn require_deployment(
    manager: &DeploymentManager,
    app_id: AppId,
    name: &str,
) -> anyhow::Result<Deployment> {
    manager
        .find(name, app_id)?
        .ok_or_else(|| ReleaseError::NotFound(name.to_string()).into())
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
