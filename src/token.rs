//! Notebook access tokens
//!
//! A token is 16 distinct characters sampled from `[A-Za-z0-9]`. Tokens are
//! generated fresh for each creation attempt; there is no cross-notebook
//! uniqueness check because notebook names already are unique.

use rand::seq::SliceRandom;
use rand::Rng;

/// Number of characters in an access token
pub const TOKEN_LENGTH: usize = 16;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Notebook server access token
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Generate a new random token
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generate a token from the given RNG
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let token = ALPHABET
            .choose_multiple(rng, TOKEN_LENGTH)
            .map(|&b| b as char)
            .collect();
        Self(token)
    }

    /// Wrap a token recovered from an existing notebook config
    pub fn from_existing(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose the actual token in debug output
        f.debug_tuple("AccessToken").field(&"<redacted>").finish()
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
