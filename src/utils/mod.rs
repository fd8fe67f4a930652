// ABOUTME: Utility functions shared across keyrelay modules
// ABOUTME: Hosts opaque identifier and secret generation helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

/// Opaque identifier and secret generation backed by the system RNG
pub mod ids;

pub(crate) mod time;

pub use ids::{generate_client_id, generate_client_secret, generate_session_id, random_token};
