//! # PhotoVault Testkit
//!
//! Testing utilities for PhotoVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a started [`photovault::Vault`] with fixed secrets plus an
//!   in-memory content source, ready to upload to and share from
//! - **Generators**: Proptest strategies for secrets, keys, identifiers and
//!   issue requests
//! - **Format vectors**: master key fingerprints and share tokens computed
//!   from fixed inputs, exportable as JSON
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use photovault_testkit::fixtures::{image_bytes, TestFixture};
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     fixture.upload("alice", "holiday", "img-1", &image_bytes(1, 256)).await;
//!     let gateway = fixture.gateway();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use photovault_testkit::generators::{data_key, key_vault};
//!
//! proptest! {
//!     #[test]
//!     fn wrap_roundtrip(vault in key_vault(), key in data_key()) {
//!         let wrapped = vault.wrap(&key).unwrap();
//!         prop_assert_eq!(vault.unwrap(&wrapped).unwrap(), key);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod source;
pub mod vectors;

pub use fixtures::{image_bytes, test_config, TestFixture, TEST_MASTER_SECRET, TEST_SIGNING_SECRET};
pub use source::MemoryContentSource;
pub use vectors::{all_vectors, FormatVectors};
