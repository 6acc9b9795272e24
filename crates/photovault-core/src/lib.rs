//! # PhotoVault Core
//!
//! Pure primitives for the PhotoVault security layer: the key hierarchy,
//! the content cipher, and capability tokens.
//!
//! This crate contains no I/O and no storage. Every operation here is a
//! synchronous computation over immutable inputs and is safe to call from
//! any number of tasks at once.
//!
//! ## Key Hierarchy
//!
//! ```text
//! master secret ──KeyVault──▶ wraps ──▶ per-user DataKey ──ContentCipher──▶ SealedBlob
//! ```
//!
//! - [`KeyVault`] - Holds the master key, wraps and unwraps [`DataKey`]s
//! - [`DataKey`] - Per-user data-encryption key, zeroized on drop
//! - [`ContentCipher`] - ChaCha20-Poly1305 over image and thumbnail bytes
//!
//! ## Capabilities
//!
//! - [`CapabilityClaims`] - `{typ, sub, alb, iat, exp, jti}` claim set
//! - [`CapabilityToken`] - Signed bearer string handed to the link holder
//! - [`SigningKeypair`] - Ed25519 key that signs tokens; unrelated to DEKs

pub mod cipher;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod token;
pub mod types;

pub use cipher::{BlobFormat, ContentCipher, ObjectKind, SealedBlob};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, SigningKeypair};
pub use error::{CoreError, Result};
pub use keys::{DataKey, KeyOrigin, KeyVault, WrappedKey};
pub use token::{CapabilityClaims, CapabilityToken, TokenType};
pub use types::{AlbumId, CapabilityId, ImageId, TokenHash, UserId};
