//! Sharing commands.

use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use vaultkeeper_secrets::{Caller, PermissionLevel, ShareParams};

use crate::render;
use crate::VaultContext;

#[derive(Args)]
pub struct ShareArgs {
    /// Secret id
    pub vault_id: String,

    /// Grant access to a user
    #[arg(long, conflicts_with = "with_org", required_unless_present = "with_org")]
    pub with_user: Option<String>,

    /// Grant access to every member of an organization
    #[arg(long)]
    pub with_org: Option<String>,

    /// Permission level (read, read-write)
    #[arg(long, default_value = "read")]
    pub permission: PermissionLevel,

    /// Grant expiry as RFC 3339
    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareArgs {
    fn params(&self) -> ShareParams {
        let params = ShareParams {
            shared_with_user_id: self.with_user.clone(),
            shared_with_org_id: self.with_org.clone(),
            permission_level: self.permission,
            expires_at: None,
        };
        match self.expires_at {
            Some(at) => params.expiring(at),
            None => params,
        }
    }
}

pub async fn share(ctx: &VaultContext, caller: &Caller, args: ShareArgs) -> anyhow::Result<()> {
    let grant = ctx
        .manager
        .share_secret(&args.vault_id, caller, args.params())
        .await?;
    println!("{} Shared {}", style("*").green(), args.vault_id);
    println!("{}", grant.share_id);
    Ok(())
}

pub async fn revoke(
    ctx: &VaultContext,
    caller: &Caller,
    vault_id: &str,
    share_id: &str,
) -> anyhow::Result<()> {
    ctx.manager.revoke_share(vault_id, share_id, caller).await?;
    println!("Share '{}' revoked.", share_id);
    Ok(())
}

pub async fn list(ctx: &VaultContext, caller: &Caller, vault_id: &str) -> anyhow::Result<()> {
    let shares = ctx.manager.list_shares(vault_id, caller).await?;
    render::share_table(&shares);
    Ok(())
}
