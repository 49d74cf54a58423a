use ota_state::{AppId, UserId};

use super::{Context, print_json, require_deployment};

pub fn add(ctx: &Context, app_id: AppId, name: &str, creator: UserId) -> anyhow::Result<()> {
    let deployment = ctx.manager()?.create(name, app_id, creator)?;
    println!("✓ Deployment {} created", deployment.name);
    println!("  Id:  {}", deployment.id);
    println!("  Key: {}", deployment.deployment_key);
    Ok(())
}

pub fn rename(ctx: &Context, app_id: AppId, name: &str, new_name: &str) -> anyhow::Result<()> {
    ctx.manager()?.rename(name, app_id, new_name)?;
    println!("✓ Deployment {name} renamed to {new_name}");
    Ok(())
}

pub fn remove(ctx: &Context, app_id: AppId, name: &str) -> anyhow::Result<()> {
    let report = ctx.manager()?.delete(name, app_id)?;
    println!("✓ Deployment {name} deleted ({} rows)", report.rows_deleted());
    Ok(())
}

pub async fn list(ctx: &Context, app_id: AppId) -> anyhow::Result<()> {
    let summaries = ctx.manager()?.list(app_id).await?;
    print_json(&summaries)
}

pub async fn history(
    ctx: &Context,
    app_id: AppId,
    name: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let manager = ctx.manager()?;
    let deployment = require_deployment(&manager, app_id, name)?;
    let entries = manager.history(deployment.id, limit).await?;
    print_json(&entries)
}

pub fn clear(ctx: &Context, app_id: AppId, name: &str) -> anyhow::Result<()> {
    let manager = ctx.manager()?;
    let deployment = require_deployment(&manager, app_id, name)?;
    let report = manager.purge_all(deployment.id)?;
    println!("✓ History of {name} cleared");
    print_json(&report)
}
