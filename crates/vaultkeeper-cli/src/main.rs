//! Vaultkeeper CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaultkeeper_cli::{run, Cli};
use vaultkeeper_core::VaultConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A broken config is reported by the command itself, not here.
    let logging = VaultConfig::load_or_default(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();

    // Logs go to stderr so `vaultkeeper get` can be piped.
    let level = match cli.verbose {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vaultkeeper={level}").into());

    if cli.log_json || logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    run(cli).await
}
