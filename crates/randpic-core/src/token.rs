//! # Re-fetch Tokens
//!
//! A token is `HMAC-SHA256(secret, filename)` rendered as 64 lowercase hex
//! characters. It is the only capability a client needs to fetch the same
//! image again: the server never stores tokens, it recomputes them for every
//! candidate when a lookup arrives.
//!
//! ## Security Invariant
//!
//! Tokens are keyed. Without the secret a client cannot derive the token of
//! a file it was never given, so the library cannot be enumerated by
//! guessing. Comparisons against client input are constant-time.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a rendered token in hex characters.
pub const TOKEN_HEX_LEN: usize = 64;

/// Length of secrets produced by [`TokenKey::generate`].
const GENERATED_SECRET_LEN: usize = 32;

/// The shared secret used to derive tokens.
///
/// The raw secret bytes only live long enough to key the MAC and are
/// zeroized afterwards. The keyed MAC state is cloned per derivation.
/// `Debug` never prints key material.
#[derive(Clone)]
pub struct TokenKey {
    mac: HmacSha256,
}

impl TokenKey {
    /// Build a key from a configured secret.
    ///
    /// Rejects empty secrets: an empty HMAC key would make every token
    /// computable by anyone who knows the filename.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(ConfigError::InvalidSecret("secret must not be empty".into()));
        }
        let mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| ConfigError::InvalidSecret(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Generate a random per-process key.
    ///
    /// Tokens derived from a generated key stop resolving when the process
    /// restarts.
    pub fn generate() -> Result<Self, ConfigError> {
        let mut secret = Zeroizing::new(vec![0u8; GENERATED_SECRET_LEN]);
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self::new(secret.to_vec())
    }

    /// Derive the token for a base filename.
    pub fn token_for(&self, filename: &str) -> AccessToken {
        let mut mac = self.mac.clone();
        mac.update(filename.as_bytes());
        AccessToken(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKey")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Derive the token for `filename` under `secret`.
///
/// Convenience wrapper around [`TokenKey::new`] + [`TokenKey::token_for`]
/// for one-off derivations. Handlers hold a [`TokenKey`] instead.
pub fn token(filename: &str, secret: &[u8]) -> Result<AccessToken, ConfigError> {
    Ok(TokenKey::new(secret)?.token_for(filename))
}

/// A derived re-fetch token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    /// Return the token as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a client-supplied token.
    ///
    /// When lengths differ a dummy comparison runs so the length check does
    /// not stand out in timing.
    pub fn matches(&self, provided: &str) -> bool {
        let expected = self.0.as_bytes();
        let provided = provided.as_bytes();
        if provided.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        expected.ct_eq(provided).into()
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
