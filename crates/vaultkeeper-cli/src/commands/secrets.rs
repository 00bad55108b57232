//! Secret lifecycle commands: create, get, list, update, rotate, delete.

use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use vaultkeeper_secrets::{
    Caller, CreateSecretParams, ListFilter, SecretProvider, SecretType, UpdateSecretParams,
};

use super::read_value;
use crate::render;
use crate::VaultContext;

#[derive(Args)]
pub struct CreateArgs {
    /// Display name
    pub name: String,

    /// Secret value (if omitted, prompts for hidden input)
    #[arg(long)]
    pub value: Option<String>,

    /// Secret type (api_key, database_credential, token, ...)
    #[arg(long = "type")]
    pub secret_type: Option<SecretType>,

    /// Provider (openai, aws, postgres, ...)
    #[arg(long)]
    pub provider: Option<SecretProvider>,

    #[arg(long)]
    pub description: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Owning organization
    #[arg(long)]
    pub org: Option<String>,

    /// Expiry as RFC 3339, e.g. 2025-12-31T00:00:00Z
    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Enable rotation reminders every N days
    #[arg(long)]
    pub rotation_days: Option<u32>,
}

#[derive(Args)]
pub struct GetArgs {
    /// Secret id
    pub vault_id: String,

    /// Show metadata instead of the value
    #[arg(long)]
    pub metadata: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long = "type")]
    pub secret_type: Option<SecretType>,

    #[arg(long)]
    pub provider: Option<SecretProvider>,

    #[arg(long)]
    pub tag: Option<String>,

    /// Include deleted secrets
    #[arg(long)]
    pub all: bool,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Secret id
    pub vault_id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Replace tags (repeatable)
    #[arg(long = "tag")]
    pub tags: Option<Vec<String>>,

    /// New value
    #[arg(long)]
    pub value: Option<String>,

    /// Prompt for a new value
    #[arg(long, conflicts_with = "value")]
    pub prompt_value: bool,

    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Remove the expiry
    #[arg(long, conflicts_with = "expires_at")]
    pub no_expiry: bool,

    #[arg(long)]
    pub rotation_days: Option<u32>,

    /// Turn off rotation
    #[arg(long, conflicts_with = "rotation_days")]
    pub no_rotation: bool,
}

#[derive(Args)]
pub struct RotateArgs {
    /// Secret id
    pub vault_id: String,

    /// New value (if omitted, prompts for hidden input)
    #[arg(long)]
    pub value: Option<String>,
}

pub async fn create(ctx: &VaultContext, caller: &Caller, args: CreateArgs) -> anyhow::Result<()> {
    let value = read_value(args.value, &format!("Enter value for '{}': ", args.name))?;

    let mut params = CreateSecretParams::new(args.name, value).with_tags(args.tags);
    if let Some(secret_type) = args.secret_type {
        params = params.with_type(secret_type);
    }
    if let Some(provider) = args.provider {
        params = params.with_provider(provider);
    }
    if let Some(expires_at) = args.expires_at {
        params = params.with_expiry(expires_at);
    }
    if let Some(days) = args.rotation_days {
        params = params.with_rotation(days);
    }
    params.description = args.description;
    params.organization_id = args.org;

    let item = ctx.manager.create_secret(caller, params).await?;
    println!("{} Stored '{}'", style("*").green(), item.name);
    println!("{}", item.vault_id);
    Ok(())
}

pub async fn get(ctx: &VaultContext, caller: &Caller, args: GetArgs) -> anyhow::Result<()> {
    let view = ctx
        .manager
        .get_secret(&args.vault_id, caller, !args.metadata)
        .await?;

    if view.verified == Some(false) {
        eprintln!(
            "{} integrity anchor could not be verified",
            style("warning:").yellow().bold()
        );
    }

    match &view.value {
        Some(value) if !args.metadata => println!("{}", value.expose()),
        _ => render::secret_detail(&view.item),
    }
    Ok(())
}

pub async fn list(ctx: &VaultContext, caller: &Caller, args: ListArgs) -> anyhow::Result<()> {
    let filter = ListFilter {
        secret_type: args.secret_type,
        provider: args.provider,
        tag: args.tag,
        include_inactive: args.all,
    };
    let items = ctx.manager.list_secrets(caller, &filter).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        render::secret_table(&items);
    }
    Ok(())
}

pub async fn update(ctx: &VaultContext, caller: &Caller, args: UpdateArgs) -> anyhow::Result<()> {
    let value = if args.prompt_value {
        Some(read_value(None, "Enter new value: ")?)
    } else {
        args.value.map(|v| read_value(Some(v), "")).transpose()?
    };

    let params = UpdateSecretParams {
        name: args.name,
        description: args.description.map(Some),
        tags: args.tags,
        metadata: None,
        value,
        expires_at: if args.no_expiry {
            Some(None)
        } else {
            args.expires_at.map(Some)
        },
        rotation_enabled: if args.no_rotation {
            Some(false)
        } else {
            args.rotation_days.map(|_| true)
        },
        rotation_days: args.rotation_days.map(Some),
    };

    let item = ctx
        .manager
        .update_secret(&args.vault_id, caller, params)
        .await?;
    println!(
        "{} Updated '{}' (version {})",
        style("*").green(),
        item.name,
        item.version
    );
    Ok(())
}

pub async fn rotate(ctx: &VaultContext, caller: &Caller, args: RotateArgs) -> anyhow::Result<()> {
    let value = read_value(args.value, "Enter new value: ")?;
    let item = ctx
        .manager
        .rotate_secret(&args.vault_id, caller, value)
        .await?;
    println!(
        "{} Rotated '{}' (version {})",
        style("*").green(),
        item.name,
        item.version
    );
    Ok(())
}

pub async fn rotate_key(ctx: &VaultContext, caller: &Caller, vault_id: &str) -> anyhow::Result<()> {
    let item = ctx.manager.rotate_key(vault_id, caller).await?;
    println!("{} Re-encrypted '{}' under a new data key", style("*").green(), item.name);
    Ok(())
}

pub async fn delete(ctx: &VaultContext, caller: &Caller, vault_id: &str) -> anyhow::Result<()> {
    ctx.manager.delete_secret(vault_id, caller).await?;
    println!("Secret '{}' deleted.", vault_id);
    Ok(())
}

pub async fn due(ctx: &VaultContext, caller: &Caller) -> anyhow::Result<()> {
    let items = ctx.manager.secrets_due_for_rotation(caller).await?;
    if items.is_empty() {
        println!("No secrets are due for rotation.");
    } else {
        render::secret_table(&items);
    }
    Ok(())
}
