//! Vaultkeeper command-line interface.

pub mod commands;
pub mod context;
pub mod render;

use clap::{Parser, Subcommand};
use vaultkeeper_secrets::Caller;

pub use context::VaultContext;

/// Vaultkeeper - envelope-encrypted secret storage
#[derive(Parser)]
#[command(name = "vaultkeeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Path to config file
    #[arg(short, long, env = "VAULTKEEPER_CONFIG", global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Acting user id
    #[arg(short, long, env = "VAULTKEEPER_USER", global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Store a new secret (prompts for the value)
    Create(commands::secrets::CreateArgs),

    /// Print a decrypted secret
    Get(commands::secrets::GetArgs),

    /// List your secrets
    List(commands::secrets::ListArgs),

    /// Update a secret's fields or value
    Update(commands::secrets::UpdateArgs),

    /// Replace a secret's value
    Rotate(commands::secrets::RotateArgs),

    /// Re-encrypt a secret under a fresh data key
    RotateKey {
        /// Secret id
        vault_id: String,
    },

    /// Delete a secret (soft delete)
    Delete {
        /// Secret id
        vault_id: String,
    },

    /// List secrets whose rotation window has elapsed
    Due,

    /// Share a secret with a user or organization
    Share(commands::sharing::ShareArgs),

    /// Revoke a share
    Revoke {
        /// Secret id
        vault_id: String,

        /// Share id
        share_id: String,
    },

    /// List the shares on a secret
    Shares {
        /// Secret id
        vault_id: String,
    },

    /// Show the access log of a secret
    Logs {
        /// Secret id
        vault_id: String,

        /// Maximum entries to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show statistics about your secrets
    Stats,

    /// Permanently erase all of your secrets
    Erase {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Generate a master key
    Keygen(commands::keygen::KeygenArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Keygen(args) => commands::keygen::run(args, config_path).await,
        Commands::Config(args) => commands::config::run(args, config_path).await,
        command => {
            let caller = caller(cli.user.as_deref())?;
            let ctx = VaultContext::open(config_path).await?;
            dispatch(&ctx, &caller, command).await
        }
    }
}

async fn dispatch(ctx: &VaultContext, caller: &Caller, command: Commands) -> anyhow::Result<()> {
    use commands::{audit, secrets, sharing};

    match command {
        Commands::Create(args) => secrets::create(ctx, caller, args).await,
        Commands::Get(args) => secrets::get(ctx, caller, args).await,
        Commands::List(args) => secrets::list(ctx, caller, args).await,
        Commands::Update(args) => secrets::update(ctx, caller, args).await,
        Commands::Rotate(args) => secrets::rotate(ctx, caller, args).await,
        Commands::RotateKey { vault_id } => secrets::rotate_key(ctx, caller, &vault_id).await,
        Commands::Delete { vault_id } => secrets::delete(ctx, caller, &vault_id).await,
        Commands::Due => secrets::due(ctx, caller).await,
        Commands::Share(args) => sharing::share(ctx, caller, args).await,
        Commands::Revoke { vault_id, share_id } => {
            sharing::revoke(ctx, caller, &vault_id, &share_id).await
        }
        Commands::Shares { vault_id } => sharing::list(ctx, caller, &vault_id).await,
        Commands::Logs { vault_id, limit } => audit::logs(ctx, caller, &vault_id, limit).await,
        Commands::Stats => audit::stats(ctx, caller).await,
        Commands::Erase { yes } => audit::erase(ctx, caller, yes).await,
        Commands::Keygen(_) | Commands::Config(_) => {
            unreachable!("handled before the vault is opened")
        }
    }
}

/// Build the acting caller from `--user`.
pub fn caller(user: Option<&str>) -> anyhow::Result<Caller> {
    let user = user
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| anyhow::anyhow!("--user (or VAULTKEEPER_USER) is required"))?;
    Ok(Caller::new(user).with_user_agent(concat!("vaultkeeper-cli/", env!("CARGO_PKG_VERSION"))))
}
