//! Configuration management commands.

use std::path::{Path, PathBuf};

use clap::Args;
use vaultkeeper_core::{paths, VaultConfig};

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = resolve_path(config_path)?;

    match args.command {
        ConfigCommand::Show => {
            let config = VaultConfig::load_or_default(Some(&path))?;
            println!("{}", config.to_json5()?);
        }

        ConfigCommand::Get { key } => {
            let config = VaultConfig::load_or_default(Some(&path))?;
            let json = serde_json::to_value(&config)?;
            match lookup(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Set { key, value } => {
            let config = VaultConfig::load_or_default(Some(&path))?;
            let mut json = serde_json::to_value(&config)?;
            assign(&mut json, &key, &value);

            let updated: VaultConfig = serde_json::from_value(json)
                .map_err(|e| anyhow::anyhow!("Invalid configuration after set: {}", e))?;
            updated
                .validate()
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            updated.save(&path)?;

            println!("Set {} = {}", key, value);
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            VaultConfig::default().save(&path)?;
            println!("Created config file: {}", path.display());
            println!("  Tip: Run 'vaultkeeper keygen' to create a persistent master key.");
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Validate => match VaultConfig::load(&path) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => anyhow::bail!("Configuration error: {}", e),
            },
            Err(e) => anyhow::bail!("Failed to load config: {}", e),
        },
    }

    Ok(())
}

fn resolve_path(config_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match config_path {
        Some(p) => Ok(p.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

fn lookup<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.').try_fold(json, |acc, k| acc.get(k))
}

/// Set a dot-separated key, creating intermediate objects as needed.
///
/// The value is parsed as JSON first so numbers and booleans keep their type;
/// anything else is stored as a string.
fn assign(json: &mut serde_json::Value, key: &str, value: &str) {
    let parsed: serde_json::Value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            current[part] = parsed;
            return;
        }
        if !current.get(part).map_or(false, |v| v.is_object()) {
            current[part] = serde_json::json!({});
        }
        current = &mut current[part];
    }
}
