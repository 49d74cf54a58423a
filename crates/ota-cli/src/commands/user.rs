use ota_release::{RandomTokenGenerator, register_user};

use super::Context;

pub fn add(ctx: &Context, email: &str) -> anyhow::Result<()> {
    let store = ctx.store()?;
    let user = register_user(&store, &RandomTokenGenerator, email)?;
    println!("✓ User {} registered", user.email);
    println!("  Id:        {}", user.id);
    println!("  Identical: {}", user.identical);
    Ok(())
}
