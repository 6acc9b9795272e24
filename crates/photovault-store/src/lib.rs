//! # PhotoVault Store
//!
//! Storage abstraction for the PhotoVault security layer. Persists two kinds
//! of rows behind the [`Store`] trait:
//!
//! - [`UserKeyRecord`] - one wrapped data-encryption key per user
//! - [`ShareCapability`] - one row per issued share link, keyed by token hash
//!
//! The primary implementation is [`SqliteStore`], with [`MemoryStore`] for
//! tests and single-process deployments.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use photovault_store::{SqliteStore, Store};
//! use photovault_core::UserId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!     let record = store.get_user_key(&UserId::new("u1")).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic consumption**: [`Store::consume_view`] checks a capability and
//!   increments its view counter in one storage operation, so `view_count`
//!   can never pass `max_views` however many requests race.
//! - **Insert-if-absent keys**: [`Store::insert_user_key_if_absent`] hands back
//!   the record that won, so racing first writers converge on a single DEK.
//! - **Idempotent revoke**: revoking twice reports `AlreadyRevoked`, not an error.

pub mod error;
pub mod memory;
pub mod migration;
pub mod records;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use records::{CapabilityState, ShareCapability, UserKeyRecord};
pub use sqlite::SqliteStore;
pub use traits::{ConsumeOutcome, InsertResult, RevokeOutcome, Store};

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
