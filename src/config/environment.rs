// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, validation, and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

//! Environment-based configuration management for production deployment

use crate::constants::{env_config, limits};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::info;

/// Runtime configuration for the keyrelay stores and fan-out channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Database connection string (`sqlite:...`)
    pub database_url: String,
    /// Bound on any single store operation, in milliseconds
    pub op_timeout_ms: u64,
    /// Per-connection delivery timeout during fan-out, in milliseconds
    pub delivery_timeout_ms: u64,
    /// Buffered events per live connection
    pub delivery_channel_capacity: usize,
    /// Maximum clients held in the registry read cache
    pub client_cache_capacity: usize,
    /// How long a cached client stays fresh, in seconds
    pub client_cache_ttl_secs: u64,
    /// Interval between expiry sweeps, in seconds
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: env_config::database_url(),
            op_timeout_ms: limits::DEFAULT_OP_TIMEOUT_MS,
            delivery_timeout_ms: limits::DEFAULT_DELIVERY_TIMEOUT_MS,
            delivery_channel_capacity: limits::DELIVERY_CHANNEL_CAPACITY,
            client_cache_capacity: limits::CLIENT_CACHE_CAPACITY,
            client_cache_ttl_secs: limits::CLIENT_CACHE_TTL_SECS,
            sweep_interval_secs: limits::DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with validation
    ///
    /// # Errors
    /// Returns an error if a variable is present but unparseable, or if a
    /// parsed value fails validation
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            database_url: env_config::database_url(),
            op_timeout_ms: parse_env("KEYRELAY_OP_TIMEOUT_MS", limits::DEFAULT_OP_TIMEOUT_MS)?,
            delivery_timeout_ms: parse_env(
                "KEYRELAY_DELIVERY_TIMEOUT_MS",
                limits::DEFAULT_DELIVERY_TIMEOUT_MS,
            )?,
            delivery_channel_capacity: parse_env(
                "KEYRELAY_DELIVERY_CHANNEL_CAPACITY",
                limits::DELIVERY_CHANNEL_CAPACITY,
            )?,
            client_cache_capacity: parse_env(
                "KEYRELAY_CLIENT_CACHE_CAPACITY",
                limits::CLIENT_CACHE_CAPACITY,
            )?,
            client_cache_ttl_secs: parse_env(
                "KEYRELAY_CLIENT_CACHE_TTL_SECS",
                limits::CLIENT_CACHE_TTL_SECS,
            )?,
            sweep_interval_secs: parse_env(
                "KEYRELAY_SWEEP_INTERVAL_SECS",
                limits::DEFAULT_SWEEP_INTERVAL_SECS,
            )?,
        };

        config.validate()?;

        info!(
            database_url = %config.database_url,
            op_timeout_ms = config.op_timeout_ms,
            sweep_interval_secs = config.sweep_interval_secs,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate parsed values
    fn validate(&self) -> AppResult<()> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::config("KEYRELAY_DATABASE_URL must not be empty"));
        }
        if self.op_timeout_ms == 0 {
            return Err(AppError::config("KEYRELAY_OP_TIMEOUT_MS must be positive"));
        }
        if self.delivery_timeout_ms == 0 {
            return Err(AppError::config(
                "KEYRELAY_DELIVERY_TIMEOUT_MS must be positive",
            ));
        }
        if self.delivery_channel_capacity == 0 {
            return Err(AppError::config(
                "KEYRELAY_DELIVERY_CHANNEL_CAPACITY must be positive",
            ));
        }
        if self.client_cache_capacity == 0 {
            return Err(AppError::config(
                "KEYRELAY_CLIENT_CACHE_CAPACITY must be positive",
            ));
        }
        Ok(())
    }

    /// Bound on any single store operation
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Per-connection delivery timeout during fan-out
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// How long a cached client stays fresh
    pub fn client_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.client_cache_ttl_secs)
    }

    /// Interval between expiry sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Parse an environment variable, falling back to a default when unset
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.op_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ServerConfig {
            op_timeout_ms: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
