//! Secret string type for safe credential handling.
//!
//! Bearer credentials and the Drive access token pass through logs, errors
//! and `Debug` output of request types; this wrapper keeps them out.

use serde::Deserialize;
use std::fmt;

/// A wrapper for secrets that prevents accidental logging.
///
/// `Debug` and `Display` show `[REDACTED]`; `expose_secret()` is the only way
/// to read the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret from any string-like value.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Explicitly expose the secret value.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// True for an empty or whitespace-only secret
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // Best-effort only; copies made elsewhere are not cleared
        self.0.clear();
        self.0.shrink_to_fit();
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}
