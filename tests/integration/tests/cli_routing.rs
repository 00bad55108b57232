//! CLI routing integration tests.
//!
//! Commands are parsed with clap and run in-process against a vault rooted
//! in a temp directory; results are checked by reopening that vault.

use std::path::Path;

use clap::Parser;
use tempfile::TempDir;
use vaultkeeper_cli::{run, Cli, VaultContext};
use vaultkeeper_integration_tests::cli_fixture;
use vaultkeeper_secrets::{Caller, ListFilter, SecretError, SecretType};

fn parse(config: &Path, args: &[&str]) -> Cli {
    let mut argv = vec!["vaultkeeper", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

async fn only_secret_id(config: &Path, user: &str) -> String {
    let ctx = VaultContext::open(Some(config)).await.unwrap();
    let items = ctx
        .manager
        .list_secrets(&Caller::new(user), &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    items[0].vault_id.clone()
}

#[tokio::test]
async fn test_create_get_and_share() {
    let dir = TempDir::new().unwrap();
    let fixture = cli_fixture(dir.path(), 9);
    let config = fixture.config_path.as_path();

    run(parse(
        config,
        &[
            "--user",
            "alice",
            "create",
            "OpenAI key",
            "--value",
            "sk-test-123",
            "--type",
            "api_key",
            "--provider",
            "openai",
        ],
    ))
    .await
    .unwrap();

    let vault_id = only_secret_id(config, "alice").await;

    run(parse(config, &["--user", "alice", "get", &vault_id]))
        .await
        .unwrap();

    // bob has no grant yet
    assert!(run(parse(config, &["--user", "bob", "get", &vault_id]))
        .await
        .is_err());

    run(parse(
        config,
        &["--user", "alice", "share", &vault_id, "--with-user", "bob"],
    ))
    .await
    .unwrap();

    let ctx = VaultContext::open(Some(config)).await.unwrap();
    let view = ctx
        .manager
        .get_secret(&vault_id, &Caller::new("bob"), true)
        .await
        .unwrap();
    assert_eq!(view.value.unwrap().expose(), "sk-test-123");
    assert_eq!(view.item.secret_type, SecretType::ApiKey);
    assert_eq!(view.verified, Some(true));
}

#[tokio::test]
async fn test_rotate_delete_and_logs() {
    let dir = TempDir::new().unwrap();
    let fixture = cli_fixture(dir.path(), 10);
    let config = fixture.config_path.as_path();

    run(parse(
        config,
        &["--user", "alice", "create", "token", "--value", "v1"],
    ))
    .await
    .unwrap();
    let vault_id = only_secret_id(config, "alice").await;

    run(parse(
        config,
        &["--user", "alice", "rotate", &vault_id, "--value", "v2"],
    ))
    .await
    .unwrap();
    run(parse(config, &["--user", "alice", "rotate-key", &vault_id]))
        .await
        .unwrap();
    run(parse(config, &["--user", "alice", "delete", &vault_id]))
        .await
        .unwrap();
    run(parse(config, &["--user", "alice", "logs", &vault_id]))
        .await
        .unwrap();

    let ctx = VaultContext::open(Some(config)).await.unwrap();
    let err = ctx
        .manager
        .get_secret(&vault_id, &Caller::new("alice"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Inactive(_)));

    let stored = ctx.manager.store().get(&vault_id).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_erase_with_yes() {
    let dir = TempDir::new().unwrap();
    let fixture = cli_fixture(dir.path(), 11);
    let config = fixture.config_path.as_path();

    run(parse(
        config,
        &["--user", "alice", "create", "one", "--value", "x"],
    ))
    .await
    .unwrap();
    run(parse(config, &["--user", "alice", "erase", "--yes"]))
        .await
        .unwrap();

    let ctx = VaultContext::open(Some(config)).await.unwrap();
    let stats = ctx.manager.get_stats(&Caller::new("alice")).await.unwrap();
    assert_eq!(stats.total, 0);
}

#[tokio::test]
async fn test_missing_user_is_rejected() {
    let dir = TempDir::new().unwrap();
    let fixture = cli_fixture(dir.path(), 12);

    let cli = parse(&fixture.config_path, &["stats"]);
    if cli.user.is_none() {
        assert!(run(cli).await.is_err());
    }
}

#[tokio::test]
async fn test_missing_master_key_fails_closed() {
    let dir = TempDir::new().unwrap();
    let fixture = cli_fixture(dir.path(), 13);
    std::env::remove_var(&fixture.key_var);

    let result = run(parse(&fixture.config_path, &["--user", "alice", "stats"])).await;
    assert!(result.is_err());
}

#[test]
fn test_unknown_command() {
    assert!(Cli::try_parse_from(["vaultkeeper", "nonexistent-command"]).is_err());
}

#[test]
fn test_help_lists_commands() {
    let err = match Cli::try_parse_from(["vaultkeeper", "--help"]) {
        Ok(_) => panic!("--help should short-circuit parsing"),
        Err(e) => e,
    };
    let help = err.to_string();
    for command in ["create", "get", "share", "rotate-key", "erase", "keygen"] {
        assert!(help.contains(command), "help should mention '{command}'");
    }
}
