//! Audit and reporting commands.

use std::io::{self, BufRead, Write};

use console::style;
use vaultkeeper_secrets::Caller;

use crate::render;
use crate::VaultContext;

pub async fn logs(
    ctx: &VaultContext,
    caller: &Caller,
    vault_id: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let entries = ctx.manager.get_access_logs(vault_id, caller, limit).await?;
    render::log_table(&entries);
    Ok(())
}

pub async fn stats(ctx: &VaultContext, caller: &Caller) -> anyhow::Result<()> {
    let stats = ctx.manager.get_stats(caller).await?;
    render::stats(&stats);
    Ok(())
}

/// Permanently erase every secret owned by the caller.
pub async fn erase(ctx: &VaultContext, caller: &Caller, yes: bool) -> anyhow::Result<()> {
    if !yes && !confirm(&caller.user_id)? {
        println!("Aborted.");
        return Ok(());
    }

    let erased = ctx.manager.erase_user(caller).await?;
    println!(
        "{} Erased {} secret(s) owned by '{}'",
        style("*").green(),
        erased,
        caller.user_id
    );
    Ok(())
}

fn confirm(user_id: &str) -> anyhow::Result<bool> {
    eprint!(
        "{} This permanently deletes every secret owned by '{}'. Type the user id to confirm: ",
        style("warning:").red().bold(),
        user_id
    );
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == user_id)
}
