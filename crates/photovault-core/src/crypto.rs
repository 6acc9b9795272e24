//! Signing primitives for capability tokens.
//!
//! Tokens are signed with Ed25519. The signing key is configured separately
//! from the master secret and never touches content keys, so verifying a
//! token needs no per-user key material at all.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::keys::parse_hex_key;

/// blake3 `derive_key` context for turning a passphrase into a signing seed.
const SIGNING_SEED_CONTEXT: &str = "photovault 2024-06 capability signing seed";

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        verifying_key
            .verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CoreError::MalformedToken(format!("signature is {} bytes", bytes.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &hex::encode(self.0)[..16])
    }
}

/// The server's token-signing key.
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Build from an operator-supplied secret, using the same acceptance
    /// rule as the master key: 64 hex characters are the seed itself,
    /// anything else is hashed into one.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(CoreError::KeyUnavailable("signing secret is empty".into()));
        }
        let seed = parse_hex_key(secret)
            .unwrap_or_else(|| blake3::derive_key(SIGNING_SEED_CONTEXT, secret));
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKeypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = SigningKeypair::generate();
        let signature = keypair.sign(b"claims");

        keypair
            .public_key()
            .verify(b"claims", &signature)
            .expect("valid signature should verify");
        assert!(keypair.public_key().verify(b"claimz", &signature).is_err());
    }

    #[test]
    fn test_from_secret_is_deterministic() {
        let a = SigningKeypair::from_secret("link signing passphrase").unwrap();
        let b = SigningKeypair::from_secret("link signing passphrase").unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_other_key_rejects_signature() {
        let a = SigningKeypair::generate();
        let b = SigningKeypair::generate();
        let signature = a.sign(b"claims");
        assert!(matches!(
            b.public_key().verify(b"claims", &signature),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_signature_from_slice_checks_length() {
        assert!(Ed25519Signature::from_slice(&[0u8; 63]).is_err());
        assert!(Ed25519Signature::from_slice(&[0u8; 64]).is_ok());
    }
}
