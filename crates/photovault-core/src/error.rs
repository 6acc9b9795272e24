//! Error types for PhotoVault Core.

use thiserror::Error;

/// Errors raised by the key hierarchy, the content cipher and token codec.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The master key is missing, misconfigured, or does not match the one
    /// a stored key was wrapped under.
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    /// Ciphertext was tampered with or decrypted under the wrong key.
    #[error("decryption failed integrity check")]
    DecryptionIntegrity,

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Token was minted for another purpose (e.g. a login token).
    #[error("wrong token type: expected {expected}, got {actual}")]
    WrongTokenType { expected: String, actual: String },

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
