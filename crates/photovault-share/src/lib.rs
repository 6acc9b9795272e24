//! # PhotoVault Share
//!
//! Album sharing through bearer capability links.
//!
//! ## Lifecycle
//!
//! ```text
//! issue ──▶ Active ──validate──▶ Active ... ──▶ Exhausted
//!             │                      │
//!             ├──── now >= expires ──┴──▶ Expired
//!             └──── revoke ─────────────▶ Revoked
//! ```
//!
//! - [`CapabilityIssuer`] - Signs a token and writes its capability row
//! - [`CapabilityValidator`] - Verifies a token and consumes one view
//!   atomically, plus revoke, stats and listing
//!
//! The signed token proves the link was minted here and names the owner and
//! album. Everything that can change over the link's life (views, expiry,
//! revocation) lives in the stored row, which is the only authority for it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use photovault_core::SigningKeypair;
//! use photovault_share::{CapabilityIssuer, CapabilityValidator, IssueRequest};
//! use photovault_store::{now_millis, MemoryStore};
//!
//! async fn example() {
//!     let store = Arc::new(MemoryStore::new());
//!     let signer = Arc::new(SigningKeypair::generate());
//!     let issuer = CapabilityIssuer::new(Arc::clone(&store), Arc::clone(&signer));
//!     let validator = CapabilityValidator::new(store, signer.public_key());
//!
//!     let request = IssueRequest::new("owner", "album", 24).with_max_views(10);
//!     let issued = issuer.issue(&request, now_millis()).await.unwrap();
//!     let context = validator.validate(&issued.token, now_millis()).await.unwrap();
//! }
//! ```

pub mod error;
pub mod issuer;
pub mod validator;

pub use error::{Result, ShareError};
pub use issuer::{CapabilityIssuer, IssueRequest, IssuedCapability};
pub use validator::{CapabilityContext, CapabilityStats, CapabilityValidator};

pub use photovault_store::CapabilityState;
