//! Startup configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use photovault_core::CoreError;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

pub const ENV_ENVIRONMENT: &str = "PHOTOVAULT_ENV";
pub const ENV_MASTER_KEY: &str = "PHOTOVAULT_MASTER_KEY";
pub const ENV_SIGNING_KEY: &str = "PHOTOVAULT_SIGNING_KEY";
pub const ENV_DATABASE: &str = "PHOTOVAULT_DATABASE";

/// Shortest secret accepted in production, in bytes.
pub const DEFAULT_MIN_SECRET_LEN: usize = 32;

/// Deployment environment. Decides whether missing key material is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(VaultError::Config(format!("unknown environment: {other}"))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a [`crate::Vault`].
#[derive(Clone)]
pub struct VaultConfig {
    pub environment: Environment,
    /// Master secret: 64 hex characters, or a passphrase to derive from.
    pub master_secret: Option<Zeroizing<String>>,
    /// Seed material for the token signing key, same format as the master.
    pub signing_secret: Option<Zeroizing<String>>,
    /// SQLite file. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    pub min_secret_len: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            master_secret: None,
            signing_secret: None,
            database_path: None,
            min_secret_len: DEFAULT_MIN_SECRET_LEN,
        }
    }
}

impl VaultConfig {
    /// Development config with both secrets set.
    pub fn with_secrets(master: impl Into<String>, signing: impl Into<String>) -> Self {
        Self {
            master_secret: Some(Zeroizing::new(master.into())),
            signing_secret: Some(Zeroizing::new(signing.into())),
            ..Self::default()
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = match var(ENV_ENVIRONMENT) {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        Ok(Self {
            environment,
            master_secret: var(ENV_MASTER_KEY).map(Zeroizing::new),
            signing_secret: var(ENV_SIGNING_KEY).map(Zeroizing::new),
            database_path: var(ENV_DATABASE).map(PathBuf::from),
            min_secret_len: DEFAULT_MIN_SECRET_LEN,
        })
    }

    /// Enforce the production key policy.
    ///
    /// Development accepts anything; missing secrets are replaced at startup.
    pub fn validate(&self) -> Result<()> {
        if self.environment != Environment::Production {
            return Ok(());
        }

        let master = self.master_secret.as_ref().ok_or_else(|| {
            CoreError::KeyUnavailable(format!("{ENV_MASTER_KEY} is required in production"))
        })?;
        if master.len() < self.min_secret_len {
            return Err(CoreError::KeyUnavailable(format!(
                "{ENV_MASTER_KEY} must be at least {} bytes",
                self.min_secret_len
            ))
            .into());
        }

        let signing = self.signing_secret.as_ref().ok_or_else(|| {
            VaultError::Config(format!("{ENV_SIGNING_KEY} is required in production"))
        })?;
        if signing.len() < self.min_secret_len {
            return Err(VaultError::Config(format!(
                "{ENV_SIGNING_KEY} must be at least {} bytes",
                self.min_secret_len
            )));
        }
        if same_key_material(signing, master) {
            return Err(VaultError::Config(format!(
                "{ENV_SIGNING_KEY} must differ from {ENV_MASTER_KEY}"
            )));
        }

        Ok(())
    }
}

/// Whether two secrets would yield the same 32 bytes. Hex secrets are keys
/// themselves, and hex digits are read case-insensitively.
fn same_key_material(a: &str, b: &str) -> bool {
    let is_hex_key = |s: &str| s.len() == 64 && s.bytes().all(|c| c.is_ascii_hexdigit());
    a == b || (is_hex_key(a) && is_hex_key(b) && a.eq_ignore_ascii_case(b))
}

// Secrets are reported as present or absent, never printed.
impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("environment", &self.environment)
            .field("master_secret", &self.master_secret.as_ref().map(|_| "<set>"))
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "<set>"))
            .field("database_path", &self.database_path)
            .field("min_secret_len", &self.min_secret_len)
            .finish()
    }
}
