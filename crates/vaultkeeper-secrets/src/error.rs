//! Error types for the secret engine.

use thiserror::Error;

/// Errors that can occur during secret operations.
///
/// `DecryptionFailed` carries no detail: a wrong key, a failed DEK unwrap
/// and a tampered ciphertext all surface as the same value.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Secret is inactive: {0}")]
    Inactive(String),

    #[error("Secret expired: {0}")]
    Expired(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Master key error: {0}")]
    KeySource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecretError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            SecretError::Validation(_) => "validation_error",
            SecretError::AccessDenied => "access_denied",
            SecretError::NotFound(_) => "not_found",
            SecretError::Inactive(_) => "inactive",
            SecretError::Expired(_) => "expired",
            SecretError::DecryptionFailed => "decryption_error",
            SecretError::EncryptionFailed(_) => "encryption_error",
            SecretError::Persistence(_) | SecretError::Io(_) | SecretError::Json(_) => {
                "persistence_error"
            }
            SecretError::KeySource(_) => "key_source_error",
        }
    }

    /// True when the caller can fix the problem by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SecretError::Validation(_)
                | SecretError::AccessDenied
                | SecretError::NotFound(_)
                | SecretError::Inactive(_)
                | SecretError::Expired(_)
        )
    }

    /// Shorthand for building a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        SecretError::Validation(msg.into())
    }
}

/// Convenience result alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;
