//! Store trait: the abstract interface for key and capability persistence.
//!
//! This trait keeps the vault storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (tests, single process).

use async_trait::async_trait;
use photovault_core::{AlbumId, CapabilityId, TokenHash, UserId};

use crate::error::Result;
use crate::records::{CapabilityState, ShareCapability, UserKeyRecord};

/// Result of inserting a user key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// The record was inserted; the caller's key is the user's key.
    Inserted,
    /// Another writer got there first. The caller must use `existing`
    /// and discard the key it generated.
    AlreadyExists { existing: UserKeyRecord },
}

/// Result of an atomic view consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One view was consumed. Holds the row after the increment.
    Consumed(ShareCapability),
    /// The capability exists but is not active; nothing was changed.
    Rejected(CapabilityState),
    /// The row under this hash belongs to another owner or album; nothing
    /// was changed.
    Mismatched(ShareCapability),
    /// No capability has this token hash.
    NotFound,
}

/// Result of revoking a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
    NotFound,
}

/// Async interface for persisting key records and share capabilities.
///
/// # Design Notes
///
/// - Every state transition on a capability is one indivisible storage
///   operation. Callers never read a row, decide, and write it back.
/// - Implementations must not hold a lock across an `.await`.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // User Keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the wrapped key for a user.
    async fn get_user_key(&self, user: &UserId) -> Result<Option<UserKeyRecord>>;

    /// Insert a wrapped key unless the user already has one.
    async fn insert_user_key_if_absent(&self, record: &UserKeyRecord) -> Result<InsertResult>;

    /// Delete a user's key record. Returns whether a record existed.
    async fn delete_user_key(&self, user: &UserId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Share Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a freshly issued capability.
    ///
    /// Fails with `Conflict` if the id or token hash is already present.
    async fn insert_capability(&self, capability: &ShareCapability) -> Result<()>;

    /// Get a capability by id.
    async fn get_capability(&self, id: &CapabilityId) -> Result<Option<ShareCapability>>;

    /// Get a capability by token hash.
    async fn get_capability_by_hash(&self, hash: &TokenHash) -> Result<Option<ShareCapability>>;

    /// Atomically check the capability is active at `now` and bound to
    /// `owner` and `album`, and increment its view count.
    async fn consume_view(
        &self,
        hash: &TokenHash,
        owner: &UserId,
        album: &AlbumId,
        now: i64,
    ) -> Result<ConsumeOutcome>;

    /// Mark a capability revoked. Idempotent.
    async fn revoke_capability(&self, id: &CapabilityId) -> Result<RevokeOutcome>;

    /// List capabilities an owner has issued for an album, oldest first.
    async fn list_capabilities(
        &self,
        owner: &UserId,
        album: &AlbumId,
    ) -> Result<Vec<ShareCapability>>;
}
