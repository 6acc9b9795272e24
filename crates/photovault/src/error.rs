//! Error types for the vault facade.

use photovault_core::{CoreError, ImageId};
use photovault_share::ShareError;
use photovault_store::StoreError;
use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Key hierarchy, cipher or token failure.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Capability issuance or validation failure.
    #[error("share error: {0}")]
    Share(#[from] ShareError),

    /// Startup configuration was rejected.
    #[error("configuration error: {0}")]
    Config(String),

    /// The content collaborator failed to produce a listing or blob.
    #[error("content source error: {0}")]
    Source(String),

    /// The image is not part of the album a link grants.
    #[error("image not found: {0}")]
    ImageNotFound(ImageId),
}

impl VaultError {
    /// True if the error means ciphertext failed authentication.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, VaultError::Core(CoreError::DecryptionIntegrity))
    }

    /// True if a wrapped key or the master key could not be used.
    pub fn is_key_unavailable(&self) -> bool {
        matches!(self, VaultError::Core(CoreError::KeyUnavailable(_)))
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
