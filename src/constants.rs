// ABOUTME: Application constants, defaults, and supported protocol enums
// ABOUTME: Central place for limits, timeouts, and OAuth capability sets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

/// Service identity for structured logging
pub mod service_names {
    /// Canonical service name
    pub const KEYRELAY: &str = "keyrelay";
}

/// Operational limits and default timeouts
pub mod limits {
    /// Default bound on any single store operation (milliseconds)
    pub const DEFAULT_OP_TIMEOUT_MS: u64 = 5_000;

    /// Default per-connection delivery timeout during fan-out (milliseconds)
    pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 2_000;

    /// Buffered events per live connection before a sender blocks
    pub const DELIVERY_CHANNEL_CAPACITY: usize = 64;

    /// Maximum clients held in the registry read cache
    pub const CLIENT_CACHE_CAPACITY: usize = 256;

    /// How long a cached client stays fresh (seconds)
    pub const CLIENT_CACHE_TTL_SECS: u64 = 30;

    /// Default interval between expiry sweeps (seconds)
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

    /// Default session lifetime when the caller passes no TTL policy
    pub const DEFAULT_SESSION_TTL_SECS: u64 = 3_600;

    /// Upper bound on a single notification listing page
    pub const MAX_NOTIFICATION_PAGE: u32 = 100;

    /// Random bytes backing opaque identifiers and client secrets
    pub const OPAQUE_ID_BYTES: usize = 32;
}

/// OAuth 2.0 / OIDC capability sets clients register against
pub mod oauth {
    /// Grant types the registry accepts
    pub const SUPPORTED_GRANT_TYPES: &[&str] = &[
        "authorization_code",
        "client_credentials",
        "refresh_token",
        "urn:ietf:params:oauth:grant-type:device_code",
    ];

    /// Response types the registry accepts
    pub const SUPPORTED_RESPONSE_TYPES: &[&str] = &["code"];

    /// Scopes clients may register for
    pub const SUPPORTED_SCOPES: &[&str] = &["openid", "profile", "email", "offline_access"];

    /// Token signing algorithms clients may prefer
    pub const SUPPORTED_SIGNING_ALGS: &[&str] = &["RS256", "ES256", "EdDSA", "HS256"];

    /// Token endpoint authentication methods the registry accepts
    pub const SUPPORTED_AUTH_METHODS: &[&str] =
        &["client_secret_basic", "client_secret_post", "none"];

    /// Token endpoint authentication method for public (secretless) clients
    pub const AUTH_METHOD_NONE: &str = "none";

    /// Out-of-band redirect URN for native apps (RFC 8252)
    pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
}

/// Environment variable lookups with defaults
pub mod env_config {
    /// Database connection string
    pub fn database_url() -> String {
        std::env::var("KEYRELAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/keyrelay.db".to_owned())
    }

    /// Log level for the service
    pub fn log_level() -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned())
    }
}
