//! API key loading.
//!
//! Keys are read from `SFOX_API_KEYS` as a comma-separated list and held as
//! [`SecretString`] so they never appear in `Debug` output or logs.

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};

/// Environment variable holding the comma-separated API keys.
pub const API_KEYS_ENV: &str = "SFOX_API_KEYS";

/// The set of API keys the client pool is built from.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    keys: Vec<SecretString>,
}

impl ApiCredentials {
    /// Parses a comma-separated key list, ignoring blanks.
    ///
    /// # Errors
    ///
    /// Returns an error if no non-empty key is present.
    pub fn parse(raw: &str) -> Result<Self> {
        let keys: Vec<SecretString> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| SecretString::from(key.to_string()))
            .collect();

        if keys.is_empty() {
            bail!("no API keys found in {API_KEYS_ENV}");
        }
        Ok(Self { keys })
    }

    /// Loads keys from [`API_KEYS_ENV`].
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or holds no keys.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(API_KEYS_ENV)
            .with_context(|| format!("{API_KEYS_ENV} must be set to a comma-separated key list"))?;
        Self::parse(&raw)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false for a successfully constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Yields `size` keys, cycling through the set round-robin.
    pub fn round_robin(&self, size: usize) -> impl Iterator<Item = &SecretString> + '_ {
        self.keys.iter().cycle().take(size)
    }

    /// Exposes the key at `index` for request signing.
    #[must_use]
    pub fn expose(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(|key| key.expose_secret())
    }
}
