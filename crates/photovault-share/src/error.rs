//! Error types for capability sharing.

use photovault_core::CoreError;
use photovault_store::{CapabilityState, StoreError};
use thiserror::Error;

/// Errors raised while issuing or validating share capabilities.
#[derive(Debug, Error)]
pub enum ShareError {
    /// Token failed to decode, carried a bad signature, had the wrong type,
    /// or its claims disagree with the stored row.
    #[error("invalid capability: {0}")]
    InvalidCapability(String),

    #[error("capability not found")]
    CapabilityNotFound,

    #[error("capability expired")]
    CapabilityExpired,

    #[error("capability revoked")]
    CapabilityRevoked,

    /// Every permitted view has been used.
    #[error("capability exhausted")]
    CapabilityExhausted,

    /// The requested TTL or view limit cannot produce a usable link.
    #[error("invalid share policy: {0}")]
    InvalidPolicy(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl ShareError {
    /// Error for a capability found in a non-active state.
    pub(crate) fn for_state(state: CapabilityState) -> Self {
        match state {
            CapabilityState::Expired => ShareError::CapabilityExpired,
            CapabilityState::Revoked => ShareError::CapabilityRevoked,
            CapabilityState::Exhausted => ShareError::CapabilityExhausted,
            CapabilityState::Active => {
                ShareError::InvalidCapability("active capability was rejected".into())
            }
        }
    }

    /// True for the errors a link holder can cause: bad, unknown, or dead
    /// tokens. False for infrastructure failures.
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            ShareError::InvalidCapability(_)
                | ShareError::CapabilityNotFound
                | ShareError::CapabilityExpired
                | ShareError::CapabilityRevoked
                | ShareError::CapabilityExhausted
        )
    }
}

/// Result type for share operations.
pub type Result<T> = std::result::Result<T, ShareError>;
