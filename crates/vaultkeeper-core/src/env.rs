//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get an environment variable as a u32.
pub fn get_u32(name: &str) -> Option<u32> {
    get_var(name).and_then(|v| v.trim().parse().ok())
}

/// Common environment variable names.
pub mod vars {
    /// Hex-encoded 32-byte master key.
    pub const VAULTKEEPER_MASTER_KEY: &str = "VAULTKEEPER_MASTER_KEY";

    /// Config file override.
    pub const VAULTKEEPER_CONFIG: &str = "VAULTKEEPER_CONFIG";

    /// PBKDF2 iteration override.
    pub const VAULTKEEPER_KDF_ITERATIONS: &str = "VAULTKEEPER_KDF_ITERATIONS";

    /// Data directory override.
    pub const VAULTKEEPER_DATA_DIR: &str = "VAULTKEEPER_DATA_DIR";

    /// Enables the integrity ledger when truthy.
    pub const VAULTKEEPER_INTEGRITY: &str = "VAULTKEEPER_INTEGRITY";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bool() {
        env::set_var("VK_TEST_BOOL_TRUE", "true");
        env::set_var("VK_TEST_BOOL_1", "1");
        env::set_var("VK_TEST_BOOL_FALSE", "false");
        env::set_var("VK_TEST_BOOL_0", "0");

        assert!(get_bool("VK_TEST_BOOL_TRUE"));
        assert!(get_bool("VK_TEST_BOOL_1"));
        assert!(!get_bool("VK_TEST_BOOL_FALSE"));
        assert!(!get_bool("VK_TEST_BOOL_0"));
        assert!(!get_bool("VK_TEST_BOOL_NONEXISTENT"));
    }

    #[test]
    fn test_get_var_ignores_blank() {
        env::set_var("VK_TEST_BLANK", "   ");
        assert!(get_var("VK_TEST_BLANK").is_none());
    }

    #[test]
    fn test_get_u32() {
        env::set_var("VK_TEST_U32", "150000");
        env::set_var("VK_TEST_U32_BAD", "lots");
        assert_eq!(get_u32("VK_TEST_U32"), Some(150_000));
        assert_eq!(get_u32("VK_TEST_U32_BAD"), None);
    }
}
