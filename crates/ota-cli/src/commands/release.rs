use std::path::PathBuf;

use clap::Args;
use ota_core::ReleaseMethod;
use ota_state::{AppId, NewRelease, UserId};
use tracing::debug;

use super::{Context, require_deployment};

#[derive(Args)]
pub struct ReleaseArgs {
    #[arg(long)]
    app: AppId,
    /// Deployment name
    #[arg(long)]
    deployment: String,
    /// Bundle directory to hash
    #[arg(short, long)]
    path: PathBuf,
    /// Binary version the release targets
    #[arg(long)]
    app_version: String,
    /// Blob reference of the uploaded bundle archive
    #[arg(long)]
    blob_url: String,
    /// Blob reference of the uploaded manifest
    #[arg(long)]
    manifest_blob_url: String,
    /// Archive size in bytes
    #[arg(long)]
    size: u64,
    /// Releasing user id
    #[arg(long)]
    user: UserId,
    #[arg(long)]
    mandatory: bool,
    #[arg(long)]
    description: Option<String>,
}

pub async fn release(ctx: &Context, args: ReleaseArgs) -> anyhow::Result<()> {
    let manager = ctx.manager()?;
    let deployment = require_deployment(&manager, args.app, &args.deployment)?;

    let digest =
        ota_pack::digest_bundle(&args.path, ctx.config.hash.effective_workers()).await?;
    debug!(package_type = %digest.package_type, "bundle classified");

    let package = manager.release(&NewRelease {
        deployment_id: deployment.id,
        app_version: args.app_version,
        description: args.description,
        package_hash: digest.package_hash,
        blob_url: args.blob_url,
        manifest_blob_url: args.manifest_blob_url,
        size: args.size,
        is_mandatory: args.mandatory,
        release_method: ReleaseMethod::Upload,
        original_label: None,
        original_deployment: None,
        released_by: args.user,
    })?;

    println!("✓ Released {} to {}", package.label, deployment.name);
    println!("  Package hash: {}", package.package_hash);
    println!("  Platform:     {}", digest.package_type);
    Ok(())
}
