use std::path::Path;

use serde_json::json;

use super::{Context, print_json};

pub async fn hash(ctx: &Context, path: &Path, format: &str) -> anyhow::Result<()> {
    let workers = ctx.config.hash.effective_workers();
    let digest = match ota_pack::digest_bundle(path, workers).await {
        Ok(digest) => digest,
        Err(e) => {
            eprintln!("Hash failed: {e}");
            return Err(e.into());
        }
    };

    match format {
        "json" => print_json(&json!({
            "packageHash": digest.package_hash,
            "packageType": digest.package_type,
            "manifest": digest.manifest,
        })),
        _ => {
            println!("✓ {} files hashed", digest.manifest.len());
            println!("  Package hash: {}", digest.package_hash);
            println!("  Platform:     {}", digest.package_type);
            for (file, hash) in &digest.manifest {
                println!("  {hash}  {file}");
            }
            Ok(())
        }
    }
}
