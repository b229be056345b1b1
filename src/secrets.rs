// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Secret generation: passwords, signing keys and signed identity tokens.
//!
//! # Security
//! - Randomness comes from the OS CSPRNG; a failing source is an error,
//!   never a reason to fall back to a weaker generator.
//! - Alphanumeric strings use reject-and-retry sampling so every symbol
//!   of `[0-9A-Za-z]` is equally likely.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of raw bytes behind every base64 token.
pub const TOKEN_BYTES: usize = 32;
/// Bytes requested from the source per draw.
const DRAW_CHUNK: usize = 64;
/// Draws without producing a usable symbol before the source is considered broken.
const MAX_EMPTY_DRAWS: usize = 1024;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secure random source unavailable: {0}")]
    EntropyUnavailable(String),
    #[error("Secure random source produced no usable output")]
    EntropyStalled,
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    /// Fill `buf` entirely or fail.
    fn fill(&self, buf: &mut [u8]) -> Result<(), SecretError>;
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), SecretError> {
        use rand::RngCore;
        rand::rngs::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| SecretError::EntropyUnavailable(e.to_string()))
    }
}

/// Generates every secret a reconciliation pass needs.
#[derive(Clone)]
pub struct SecretGenerator {
    source: Arc<dyn EntropySource>,
}

impl std::fmt::Debug for SecretGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretGenerator").finish_non_exhaustive()
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretGenerator {
    /// Generator backed by the OS CSPRNG.
    pub fn new() -> Self {
        Self { source: Arc::new(OsEntropy) }
    }

    pub fn with_source(source: Arc<dyn EntropySource>) -> Self {
        Self { source }
    }

    /// Random string of exactly `length` characters from `[0-9A-Za-z]`.
    ///
    /// Each byte is masked to 7 bits, which is uniform over 0..128; bytes
    /// outside the alphanumeric range are discarded rather than folded
    /// back in with a modulo.
    pub fn random_alphanumeric(&self, length: usize) -> Result<String, SecretError> {
        let mut out = String::with_capacity(length);
        let mut buf = [0u8; DRAW_CHUNK];
        let mut empty_draws = 0;

        while out.len() < length {
            self.source.fill(&mut buf)?;
            let before = out.len();
            for byte in buf {
                let candidate = byte & 0x7f;
                if candidate.is_ascii_alphanumeric() {
                    out.push(char::from(candidate));
                    if out.len() == length {
                        break;
                    }
                }
            }
            if out.len() == before {
                empty_draws += 1;
                if empty_draws >= MAX_EMPTY_DRAWS {
                    return Err(SecretError::EntropyStalled);
                }
            }
        }
        Ok(out)
    }

    /// 32 random bytes, URL-safe base64 without padding.
    pub fn random_token(&self) -> Result<String, SecretError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.source.fill(&mut bytes)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Fresh signing key plus an HS256 token signed with it, valid from `not_before`.
    pub fn internal_token(&self, not_before: DateTime<Utc>) -> Result<String, SecretError> {
        let key = self.random_token()?;
        sign_token(key.as_bytes(), not_before)
    }
}

/// Claims of an internal token: only a not-before time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalClaims {
    pub nbf: i64,
}

/// Compact HS256 JWT asserting only `nbf`.
pub fn sign_token(key: &[u8], not_before: DateTime<Utc>) -> Result<String, SecretError> {
    let claims = InternalClaims { nbf: not_before.timestamp() };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(key))
        .map_err(|e| SecretError::Signing(e.to_string()))
}

/// Verify and decode a token produced by [`sign_token`].
#[cfg(test)]
pub(crate) fn decode_token(
    key: &[u8],
    token: &str,
) -> Result<InternalClaims, jsonwebtoken::errors::Error> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = true;
    decode::<InternalClaims>(token, &DecodingKey::from_secret(key), &validation).map(|data| data.claims)
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
