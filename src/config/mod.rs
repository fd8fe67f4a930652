// ABOUTME: Configuration management for keyrelay deployments
// ABOUTME: Re-exports the environment-driven server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

/// Environment-based configuration management
pub mod environment;

pub use environment::ServerConfig;
