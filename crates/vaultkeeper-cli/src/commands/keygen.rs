//! Master key generation.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use vaultkeeper_core::{paths, VaultConfig};
use vaultkeeper_secrets::keychain::{store_in_keychain, write_key_file};
use vaultkeeper_secrets::MasterKey;

#[derive(Args)]
pub struct KeygenArgs {
    /// Key file to write (defaults to the configured key file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,

    /// Store the key in the OS keychain instead of a file
    #[arg(long, conflicts_with = "output")]
    pub keychain: bool,

    /// Print the hex key to stdout instead of storing it
    #[arg(long, conflicts_with_all = ["output", "keychain"])]
    pub print: bool,
}

pub async fn run(args: KeygenArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let key = MasterKey::generate();

    if args.print {
        println!("{}", key.to_hex().as_str());
        eprintln!("fingerprint: {}", key.fingerprint());
        return Ok(());
    }

    if args.keychain {
        store_in_keychain(&key)?;
        println!("{} Stored master key in the OS keychain", style("*").green());
    } else {
        let path = match args.output {
            Some(path) => path,
            None => default_key_path(config_path)?,
        };
        write_key_file(&path, &key, args.force)?;
        println!(
            "{} Wrote master key to {}",
            style("*").green(),
            path.display()
        );
    }

    println!("  fingerprint: {}", key.fingerprint());
    println!(
        "  {}",
        style("Back this key up. Secrets cannot be recovered without it.").yellow()
    );
    Ok(())
}

fn default_key_path(config_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    let config = VaultConfig::load_or_default(config_path)?;
    match config.master_key.key_file {
        Some(path) => Ok(path),
        None => Ok(paths::master_key_file()?),
    }
}
