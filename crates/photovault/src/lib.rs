//! # PhotoVault
//!
//! Encryption at rest and capability-based album sharing for a photo vault.
//!
//! ## Overview
//!
//! - **Key hierarchy**: one master secret wraps a data key per user; each
//!   user's originals and thumbnails are sealed under their data key.
//! - **Share links**: an owner mints a signed bearer token for an album with
//!   a lifetime and an optional view limit. Every use consumes a view.
//! - **Public retrieval**: [`ShareGateway`] serves an album and its images to
//!   whoever holds a valid link, decrypting on the fly.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use photovault::{Vault, VaultConfig};
//! use photovault::core::{ObjectKind, UserId};
//! use photovault::share::IssueRequest;
//!
//! async fn example() {
//!     let vault = Vault::open(VaultConfig::from_env().unwrap()).unwrap();
//!
//!     let owner = UserId::new("alice");
//!     let sealed = vault
//!         .seal_object(&owner, ObjectKind::Original, b"jpeg bytes")
//!         .await
//!         .unwrap();
//!
//!     let link = vault
//!         .create_share_link(&IssueRequest::new("alice", "holiday", 24).with_max_views(10))
//!         .await
//!         .unwrap();
//!     println!("{}", link.share_path());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `photovault::core` - Keys, cipher, tokens, identifiers
//! - `photovault::store` - Storage abstraction and SQLite
//! - `photovault::share` - Capability issuance and validation

pub mod config;
pub mod error;
pub mod gateway;
pub mod user_keys;
pub mod vault;

pub use config::{Environment, VaultConfig};
pub use error::{Result, VaultError};
pub use gateway::{AccessDenied, ContentSource, ShareGateway, SharedAlbum, SharedImage};
pub use user_keys::UserKeyManager;
pub use vault::Vault;

pub use photovault_core as core;
pub use photovault_share as share;
pub use photovault_store as store;
