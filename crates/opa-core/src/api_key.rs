//! PurpleAir API key handling

use std::fmt;

/// Header carrying the key on remote API requests
pub const API_KEY_HEADER: &str = "X-API-Key";

/// A wrapper for API keys that prevents accidental logging
///
/// The `Debug` and `Display` implementations mask the actual key value
/// to prevent sensitive data from appearing in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretApiKey {
    key: String,
}

impl SecretApiKey {
    /// Creates a new SecretApiKey from a string
    ///
    /// # Returns
    /// * `Some(SecretApiKey)` if the key is non-empty
    /// * `None` if the key is empty or whitespace-only
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                key: trimmed.to_string(),
            })
        }
    }

    /// Returns the actual API key value
    ///
    /// Use this only when building the request header. Never log it.
    pub fn expose(&self) -> &str {
        &self.key
    }

    /// Returns a masked form keeping the last four characters
    pub fn masked(&self) -> String {
        mask_secret(&self.key)
    }
}

impl fmt::Debug for SecretApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretApiKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for SecretApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED API KEY]")
    }
}

/// Masks all but the last four characters of a secret
///
/// Secrets of four characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
