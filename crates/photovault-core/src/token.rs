//! Capability tokens.
//!
//! A token is a CBOR claim set followed by an Ed25519 signature over it,
//! both hex-encoded and joined by a dot:
//!
//! ```text
//! hex(cbor(claims)) "." hex(signature)
//! ```
//!
//! The signature covers `TOKEN_SIGN_DOMAIN || cbor(claims)`.
//!
//! The `typ` claim keeps a token minted for one purpose from being replayed
//! as another. Only the signature, `typ`, `sub` and `alb` are trusted at
//! validation time; `exp` is informational and the persisted capability row
//! decides expiry.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Ed25519PublicKey, Ed25519Signature, SigningKeypair};
use crate::error::{CoreError, Result};
use crate::types::{AlbumId, TokenHash, UserId};

/// Domain separator prepended to the claim bytes before signing.
pub const TOKEN_SIGN_DOMAIN: &[u8] = b"photovault/capability/v1\0";

/// Purpose a token was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Album share link.
    Share,
    /// Session token for an authenticated user (minted elsewhere).
    Access,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Share => "share",
            TokenType::Access => "access",
        }
    }
}

/// The signed claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaims {
    /// Token purpose; must be `"share"` for album links.
    pub typ: String,
    /// Owner of the album.
    pub sub: UserId,
    /// Shared album.
    pub alb: AlbumId,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds), informational only.
    pub exp: i64,
    /// Random token id so that identical claims still yield distinct tokens.
    pub jti: [u8; 16],
}

impl CapabilityClaims {
    /// Claims for an album share link.
    pub fn share(owner: UserId, album: AlbumId, issued_at_secs: i64, ttl_secs: i64) -> Self {
        Self::new(TokenType::Share, owner, album, issued_at_secs, ttl_secs)
    }

    pub fn new(
        typ: TokenType,
        owner: UserId,
        album: AlbumId,
        issued_at_secs: i64,
        ttl_secs: i64,
    ) -> Self {
        let mut jti = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut jti);
        Self {
            typ: typ.as_str().to_string(),
            sub: owner,
            alb: album,
            iat: issued_at_secs,
            exp: issued_at_secs.saturating_add(ttl_secs),
            jti,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::MalformedToken(e.to_string()))
    }

    /// Sign these claims into a bearer token.
    pub fn sign(&self, keypair: &SigningKeypair) -> Result<CapabilityToken> {
        let claims = self.to_bytes()?;
        let signature = keypair.sign(&signing_message(&claims));
        Ok(CapabilityToken(format!(
            "{}.{}",
            hex::encode(&claims),
            hex::encode(signature.as_bytes())
        )))
    }
}

fn signing_message(claims: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(TOKEN_SIGN_DOMAIN.len() + claims.len());
    msg.extend_from_slice(TOKEN_SIGN_DOMAIN);
    msg.extend_from_slice(claims);
    msg
}

/// A bearer token as handed to the link holder.
#[derive(Clone, PartialEq, Eq)]
pub struct CapabilityToken(String);

impl CapabilityToken {
    /// Wrap a token string presented by a caller. No checks happen here.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Digest under which the capability row is stored.
    pub fn hash(&self) -> TokenHash {
        TokenHash::of(&self.0)
    }

    /// Verify the signature and purpose, returning the claims.
    ///
    /// Does not look at `exp`.
    pub fn verify(&self, key: &Ed25519PublicKey, expected: TokenType) -> Result<CapabilityClaims> {
        let (claims_hex, sig_hex) = self
            .0
            .split_once('.')
            .ok_or_else(|| CoreError::MalformedToken("missing separator".into()))?;

        let claims_bytes =
            hex::decode(claims_hex).map_err(|e| CoreError::MalformedToken(e.to_string()))?;
        let sig_bytes =
            hex::decode(sig_hex).map_err(|e| CoreError::MalformedToken(e.to_string()))?;
        let signature = Ed25519Signature::from_slice(&sig_bytes)?;

        key.verify(&signing_message(&claims_bytes), &signature)?;

        let claims = CapabilityClaims::from_bytes(&claims_bytes)?;
        if claims.typ != expected.as_str() {
            return Err(CoreError::WrongTokenType {
                expected: expected.as_str().to_string(),
                actual: claims.typ,
            });
        }

        Ok(claims)
    }
}

// Never print the bearer secret.
impl fmt::Debug for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityToken({:?})", self.hash())
    }
}
