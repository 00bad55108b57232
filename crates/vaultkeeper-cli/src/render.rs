//! Terminal rendering for secrets, shares, logs and stats.
//!
//! Nothing here ever receives plaintext; values are printed by the `get`
//! command directly.

use chrono::{DateTime, Utc};
use console::style;
use vaultkeeper_secrets::{AccessLogEntry, ShareGrant, VaultItemSummary, VaultStats};

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn optional_timestamp(at: Option<&DateTime<Utc>>) -> String {
    at.map(timestamp).unwrap_or_else(|| "-".to_string())
}

/// One row per secret.
pub fn secret_table(items: &[VaultItemSummary]) {
    if items.is_empty() {
        println!("No secrets stored.");
        return;
    }

    println!(
        "{:<36}  {:<24}  {:<20}  {:<10}  {:>3}  {}",
        "ID", "NAME", "TYPE", "PROVIDER", "VER", "UPDATED"
    );
    println!("{}", "-".repeat(120));
    for item in items {
        let name = if item.is_active {
            style(truncate(&item.name, 24)).bold().to_string()
        } else {
            style(truncate(&item.name, 24)).dim().strikethrough().to_string()
        };
        println!(
            "{:<36}  {:<24}  {:<20}  {:<10}  {:>3}  {}",
            item.vault_id,
            name,
            item.secret_type.as_str(),
            item.provider.as_str(),
            item.version,
            timestamp(&item.updated_at),
        );
    }
    println!("\n{} secret(s) total.", items.len());
}

/// Detailed view of one secret's metadata.
pub fn secret_detail(item: &VaultItemSummary) {
    println!("{}", style(&item.name).bold());
    println!("  id:            {}", item.vault_id);
    println!("  owner:         {}", item.user_id);
    if let Some(org) = &item.organization_id {
        println!("  organization:  {org}");
    }
    println!("  type:          {}", item.secret_type);
    println!("  provider:      {}", item.provider);
    if let Some(description) = &item.description {
        println!("  description:   {description}");
    }
    if !item.tags.is_empty() {
        println!("  tags:          {}", item.tags.join(", "));
    }
    println!("  version:       {}", item.version);
    println!(
        "  status:        {}",
        if item.is_active {
            style("active").green()
        } else {
            style("inactive").red()
        }
    );
    println!("  expires:       {}", optional_timestamp(item.expires_at.as_ref()));
    match (item.rotation_enabled, item.rotation_days) {
        (true, Some(days)) => println!("  rotation:      every {days} days"),
        _ => println!("  rotation:      off"),
    }
    println!("  accesses:      {}", item.access_count);
    println!(
        "  last access:   {}",
        optional_timestamp(item.last_accessed_at.as_ref())
    );
    if let Some(reference) = &item.blockchain_reference {
        println!("  anchor:        {reference}");
    }
    println!("  created:       {}", timestamp(&item.created_at));
    println!("  updated:       {}", timestamp(&item.updated_at));
}

pub fn share_table(shares: &[ShareGrant]) {
    if shares.is_empty() {
        println!("No shares.");
        return;
    }

    let now = Utc::now();
    println!(
        "{:<36}  {:<24}  {:<10}  {:<8}  {}",
        "SHARE ID", "TARGET", "PERMISSION", "STATUS", "EXPIRES"
    );
    println!("{}", "-".repeat(110));
    for share in shares {
        let target = match (&share.shared_with_user_id, &share.shared_with_org_id) {
            (Some(user), _) => format!("user:{user}"),
            (None, Some(org)) => format!("org:{org}"),
            (None, None) => "-".to_string(),
        };
        let status = if share.is_valid_at(now) {
            style("active").green()
        } else if share.is_active {
            style("expired").yellow()
        } else {
            style("revoked").red()
        };
        let permission = serde_json::to_value(share.permission_level)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!(
            "{:<36}  {:<24}  {:<10}  {:<8}  {}",
            share.share_id,
            truncate(&target, 24),
            permission,
            status,
            optional_timestamp(share.expires_at.as_ref()),
        );
    }
}

pub fn log_table(entries: &[AccessLogEntry]) {
    if entries.is_empty() {
        println!("No access log entries.");
        return;
    }

    println!(
        "{:<23}  {:<16}  {:<12}  {:<7}  {}",
        "TIME", "USER", "ACTION", "RESULT", "ERROR"
    );
    println!("{}", "-".repeat(90));
    for entry in entries {
        let result = if entry.success {
            style("ok").green()
        } else {
            style("failed").red()
        };
        println!(
            "{:<23}  {:<16}  {:<12}  {:<7}  {}",
            timestamp(&entry.timestamp),
            truncate(&entry.user_id, 16),
            entry.action.as_str(),
            result,
            entry.error_message.as_deref().unwrap_or(""),
        );
    }
}

pub fn stats(stats: &VaultStats) {
    println!("{}", style("Secrets").bold());
    println!("  total:             {}", stats.total);
    println!("  active:            {}", stats.active);
    println!("  inactive:          {}", stats.inactive);
    println!("  expired:           {}", stats.expired);
    println!("  expiring soon:     {}", stats.expiring_soon);
    println!("  due for rotation:  {}", stats.due_for_rotation);
    println!("  shared:            {}", stats.shared);
    println!("  total accesses:    {}", stats.total_accesses);

    if !stats.by_type.is_empty() {
        println!("\n{}", style("By type").bold());
        for (kind, count) in &stats.by_type {
            println!("  {kind:<20} {count}");
        }
    }
    if !stats.by_provider.is_empty() {
        println!("\n{}", style("By provider").bold());
        for (provider, count) in &stats.by_provider {
            println!("  {provider:<20} {count}");
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-secret-name", 10), "a-very-...");
        assert_eq!(truncate("ünïcödé-name", 8), "ünïcö...");
    }
}
