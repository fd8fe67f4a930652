// ABOUTME: Opaque identifier and secret generation using the system CSPRNG
// ABOUTME: Produces URL-safe identifiers for sessions, grants, and client credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::constants::limits::OPAQUE_ID_BYTES;
use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use uuid::Uuid;

/// Generate an opaque, URL-safe random token of `num_bytes` entropy
///
/// # Errors
/// Returns an error if the system RNG fails to produce random bytes
pub fn random_token(num_bytes: usize) -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; num_bytes];
    rng.fill(&mut bytes).map_err(|_| {
        tracing::error!("System RNG failure while generating opaque identifier");
        AppError::internal("system RNG failure")
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a fresh opaque session identifier
pub fn generate_session_id() -> AppResult<String> {
    random_token(OPAQUE_ID_BYTES)
}

/// Generate a client secret for a confidential client
pub fn generate_client_secret() -> AppResult<String> {
    random_token(OPAQUE_ID_BYTES)
}

/// Generate a unique client identifier
pub fn generate_client_id() -> String {
    format!("client_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_is_url_safe() {
        let token = random_token(32).unwrap();
        assert!(!token.is_empty());
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = random_token(32).unwrap();
        let b = random_token(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_client_id_prefix() {
        assert!(generate_client_id().starts_with("client_"));
    }
}
