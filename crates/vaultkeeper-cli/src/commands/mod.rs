//! CLI command implementations.

pub mod audit;
pub mod config;
pub mod keygen;
pub mod secrets;
pub mod sharing;

use vaultkeeper_core::SecretString;

/// Use `value` if given, otherwise prompt for hidden input.
pub(crate) fn read_value(value: Option<String>, prompt: &str) -> anyhow::Result<SecretString> {
    let value = match value {
        Some(v) => v,
        None => rpassword::prompt_password(prompt)
            .map_err(|e| anyhow::anyhow!("Failed to read secret: {}", e))?,
    };
    if value.is_empty() {
        anyhow::bail!("Secret value must not be empty");
    }
    Ok(SecretString::new(value))
}
