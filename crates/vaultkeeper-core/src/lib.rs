//! # vaultkeeper-core
//!
//! Shared building blocks for the Vaultkeeper secret engine:
//!
//! - **Configuration**: Loading, validation, and persistence of the JSON5 config file
//! - **Secure strings**: [`SecretString`], zeroed on drop and never printed
//! - **Utilities**: Path resolution, ID generation, and environment handling

pub mod config;
pub mod env;
pub mod error;
pub mod id;
pub mod paths;
pub mod secret;

// Re-exports for convenience
pub use config::VaultConfig;
pub use error::{ConfigError, Error, Result};
pub use secret::SecretString;
