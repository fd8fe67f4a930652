// ABOUTME: Main library entry point for the keyrelay identity grant store
// ABOUTME: Durable OAuth2/OIDC grant, client, and session storage with notification fan-out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

#![deny(unsafe_code)]

//! # Keyrelay
//!
//! Durable storage contracts for an OAuth 2.0 / OIDC authorization server,
//! plus a real-time notification fan-out channel. Keyrelay is the persistence
//! and delivery core that a protocol layer (token endpoints, consent UI,
//! REST/GraphQL APIs) builds on top of.
//!
//! ## Components
//!
//! - **Grant store**: authorization codes, access/refresh tokens, and device
//!   codes with opaque ids, strict expiry, and race-safe single-use
//!   consumption.
//! - **Client registry**: registered relying parties with validated redirect
//!   URIs and byte-exact redirect matching, fronted by a short-TTL cache.
//! - **Session store**: opaque session handles with TTL semantics identical
//!   to the grant store.
//! - **Notification fan-out**: durable-first publication with best-effort
//!   concurrent delivery to every live connection of a recipient.
//!
//! ## Example
//!
//! ```rust,no_run
//! use keyrelay::config::environment::ServerConfig;
//! use keyrelay::errors::AppResult;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("keyrelay configured for database: {}", config.database_url);
//!     Ok(())
//! }
//! ```

/// Client registry with validation, secret handling, and cached lookups
pub mod clients;

/// Environment-based configuration management
pub mod config;

/// Application constants and supported protocol enums
pub mod constants;

/// SQLite-backed durable storage
pub mod database;

/// Database abstraction layer with plugin support
pub mod database_plugins;

/// Unified error handling system with standard error codes
pub mod errors;

/// Grant record store with single-use consumption semantics
pub mod grants;

/// Production logging and structured output
pub mod logging;

/// Common data models for grants, clients, sessions, and notifications
pub mod models;

/// Notification persistence and live fan-out delivery
pub mod notifications;

/// Session store with opaque handles and TTL semantics
pub mod sessions;

/// Utility functions and opaque identifier generation
pub mod utils;
