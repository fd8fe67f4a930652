// ABOUTME: Unified error handling system with standard error codes and HTTP mapping
// ABOUTME: Defines the store error taxonomy shared by all keyrelay components
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

//! # Unified Error Handling System
//!
//! Centralized error types for keyrelay. Callers (an OIDC protocol layer, a
//! notification API) receive this taxonomy verbatim and dispatch on
//! [`ErrorCode`]. Expired and missing records share a single `NotFound` code
//! so probing callers cannot distinguish the two cases.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Record absent, or past expiry (uniform across both causes)
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// Insertion collision on a supposedly-fresh identifier
    #[serde(rename = "DUPLICATE_ID")]
    DuplicateId,
    /// Consume called on an already-consumed grant (code reuse)
    #[serde(rename = "ALREADY_CONSUMED")]
    AlreadyConsumed,
    /// Client registration or update failed validation
    #[serde(rename = "INVALID_CLIENT_SPEC")]
    InvalidClientSpec,
    /// Redirect URI is not byte-for-byte equal to a registered one
    #[serde(rename = "REDIRECT_MISMATCH")]
    RedirectMismatch,
    /// Client deletion rejected because live grants still reference it
    #[serde(rename = "CLIENT_IN_USE")]
    ClientInUse,
    /// A live connection existed but delivery failed (never fatal upstream)
    #[serde(rename = "DELIVERY_UNAVAILABLE")]
    DeliveryUnavailable,
    /// Storage-layer failure: timeout, connection loss, query error
    #[serde(rename = "STORE_UNAVAILABLE")]
    StoreUnavailable,
    /// Configuration error
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError,
    /// Internal error
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AlreadyConsumed | Self::InvalidClientSpec | Self::RedirectMismatch => 400,
            Self::NotFound => 404,
            Self::DuplicateId | Self::ClientInUse => 409,
            Self::DeliveryUnavailable | Self::StoreUnavailable => 503,
            Self::ConfigError | Self::InternalError => 500,
        }
    }

    /// Get a user-friendly description of this error
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "The requested record was not found",
            Self::DuplicateId => "A record with this identifier already exists",
            Self::AlreadyConsumed => "The grant has already been consumed",
            Self::InvalidClientSpec => "The client specification failed validation",
            Self::RedirectMismatch => "The redirect URI does not match any registered URI",
            Self::ClientInUse => "Live grants still reference this client",
            Self::DeliveryUnavailable => "Live delivery to the connection failed",
            Self::StoreUnavailable => "The durable store is unavailable, try again later",
            Self::ConfigError => "Configuration error encountered",
            Self::InternalError => "An internal error occurred",
        }
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Account ID if available
    pub account_id: Option<Uuid>,
    /// Record ID if applicable
    pub resource_id: Option<String>,
    /// Additional key-value context
    pub details: serde_json::Value,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            request_id: None,
            account_id: None,
            resource_id: None,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a request ID to the error context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    /// Add an account ID to the error context
    #[must_use]
    pub fn with_account_id(mut self, account_id: Uuid) -> Self {
        self.context.account_id = Some(account_id);
        self
    }

    /// Add a record ID to the error context
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.context.resource_id = Some(resource_id.into());
        self
    }

    /// Add details to the error context
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.context.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convenience functions for creating common errors
impl AppError {
    /// Record absent or expired
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Identifier collision on insertion
    pub fn duplicate_id(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DuplicateId,
            format!("{} identifier already exists", resource.into()),
        )
    }

    /// Grant already consumed (single-use violation)
    pub fn already_consumed(grant_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyConsumed, "grant already used")
            .with_resource_id(grant_id.into())
    }

    /// Client registration validation failure
    pub fn invalid_client_spec(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidClientSpec, message)
    }

    /// Redirect URI not registered for the client
    pub fn redirect_mismatch(redirect_uri: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RedirectMismatch,
            format!("redirect URI not registered: {}", redirect_uri.into()),
        )
    }

    /// Client still referenced by live grants
    pub fn client_in_use(client_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::ClientInUse, "live grants reference this client")
            .with_resource_id(client_id.into())
    }

    /// Live delivery failure
    pub fn delivery_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeliveryUnavailable, message)
    }

    /// Storage-layer failure (timeout, connection loss)
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// HTTP error response format handed to the API collaborator layer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Error payload fields
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable machine-readable code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Request ID if one was attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Additional detail payload
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                request_id: error.context.request_id,
                details: error.context.details,
            },
        }
    }
}

/// Conversion from sqlx errors into the storage taxonomy
///
/// Unique-constraint violations become `DuplicateId`; everything else is a
/// generic `StoreUnavailable` so callers can distinguish "your request was
/// invalid" from "try again later".
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        let is_unique = error
            .as_database_error()
            .is_some_and(sqlx::error::DatabaseError::is_unique_violation);
        if is_unique {
            Self::new(ErrorCode::DuplicateId, "identifier already exists").with_source(error)
        } else {
            Self::new(ErrorCode::StoreUnavailable, "database operation failed").with_source(error)
        }
    }
}

/// Conversion from `anyhow::Error` to `AppError`
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        match error.source() {
            Some(source) => Self::new(ErrorCode::InternalError, error.to_string()).with_details(
                serde_json::json!({
                    "source": source.to_string()
                }),
            ),
            None => Self::new(ErrorCode::InternalError, error.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::DuplicateId.http_status(), 409);
        assert_eq!(ErrorCode::AlreadyConsumed.http_status(), 400);
        assert_eq!(ErrorCode::StoreUnavailable.http_status(), 503);
    }

    #[test]
    fn test_app_error_creation() {
        let error = AppError::already_consumed("grant-123").with_request_id("req-1");

        assert_eq!(error.code, ErrorCode::AlreadyConsumed);
        assert_eq!(error.context.resource_id.as_deref(), Some("grant-123"));
        assert!(error.context.request_id.is_some());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = AppError::redirect_mismatch("https://evil.example/cb");
        let response = ErrorResponse::from(error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("REDIRECT_MISMATCH"));
        assert!(json.contains("evil.example"));
    }

    #[test]
    fn test_expired_and_missing_share_code() {
        // Information hiding: both causes surface the same code
        let missing = AppError::not_found("grant");
        let expired = AppError::not_found("grant");
        assert_eq!(missing.code, expired.code);
    }
}
