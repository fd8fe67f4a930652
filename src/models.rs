// ABOUTME: Core data models for grants, clients, sessions, and notifications
// ABOUTME: Persistence-facing record types shared by the store and delivery layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of an issued authorization artifact (closed enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    /// Single-use code exchanged for tokens
    AuthorizationCode,
    /// Bearer token presented to resource servers
    AccessToken,
    /// Long-lived token exchanged for fresh access tokens
    RefreshToken,
    /// Device authorization grant code (RFC 8628)
    DeviceCode,
    /// Machine-to-machine grant with no end user
    ClientCredentials,
}

impl GrantKind {
    /// Stable string form used in the persisted record
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::DeviceCode => "device_code",
            Self::ClientCredentials => "client_credentials",
        }
    }

    /// Parse the persisted string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorization_code" => Some(Self::AuthorizationCode),
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            "device_code" => Some(Self::DeviceCode),
            "client_credentials" => Some(Self::ClientCredentials),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single issued authorization artifact
///
/// `data` is an opaque payload (scopes, nonce, PKCE challenge, claims) owned
/// by the protocol layer; the store never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    /// Opaque primary identifier
    pub id: String,
    /// Logical family id grouping related tokens; revoking the family
    /// revokes every member
    pub grant_id: Option<String>,
    /// Owning client
    pub client_id: String,
    /// Owning account; `None` for client-credentials grants
    pub account_id: Option<Uuid>,
    /// Artifact kind
    pub kind: GrantKind,
    /// JWT id when the artifact is mirrored as a signed token
    pub jti: Option<String>,
    /// Issued-at timestamp
    pub iat: DateTime<Utc>,
    /// Expiry timestamp; reads at or after this instant behave as absent
    pub exp: DateTime<Utc>,
    /// Opaque protocol payload
    pub data: serde_json::Value,
    /// Single-use consumption flag
    pub consumed: bool,
    /// When the grant was consumed
    pub consumed_at: Option<DateTime<Utc>>,
}

/// A registered relying party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Internal record id
    pub id: String,
    /// Unique, immutable client identifier
    pub client_id: String,
    /// Argon2 hash of the client secret; `None` for public clients
    pub client_secret_hash: Option<String>,
    /// Registered redirect URIs; authorization requests must match one
    /// byte-for-byte
    pub redirect_uris: Vec<String>,
    /// Grant types the client may use
    pub grant_types: Vec<String>,
    /// Response types the client may use
    pub response_types: Vec<String>,
    /// Space-separated scopes the client may request
    pub scope: Option<String>,
    /// Preferred token signing algorithm
    pub signing_alg: Option<String>,
    /// Human-readable client name
    pub client_name: Option<String>,
    /// Client information URI
    pub client_uri: Option<String>,
    /// Client logo URI
    pub logo_uri: Option<String>,
    /// When the client was registered
    pub created_at: DateTime<Utc>,
    /// When the client was last updated
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// True iff `redirect_uri` is byte-for-byte equal to a registered URI.
    /// No prefix matching, no wildcard expansion.
    pub fn redirect_uri_registered(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

/// An opaque handle binding a browser/device session to an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier
    pub id: String,
    /// Authenticated account; `None` before login completes
    pub account_id: Option<Uuid>,
    /// Arbitrary session payload (interaction state, mid-flow scopes)
    pub data: serde_json::Value,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Reads at or after this instant behave as absent
    pub expires_at: DateTime<Utc>,
}

/// A durable application event directed at a user
///
/// The durable record is the system of record for "did the user ever receive
/// this"; live delivery is best-effort on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Stable numeric id; downstream consumers deduplicate on it
    pub id: i64,
    /// Recipient
    pub user_id: Uuid,
    /// Application-defined notification category
    pub notification_type_id: i32,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
    /// Optional link target
    pub link_url: Option<String>,
    /// Whether the recipient has marked it read
    pub is_read: bool,
    /// When the notification was created
    pub created_at: DateTime<Utc>,
    /// When the recipient marked it read
    pub read_at: Option<DateTime<Utc>>,
}

/// Fields supplied when publishing a new notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient
    pub user_id: Uuid,
    /// Application-defined notification category
    pub notification_type_id: i32,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
    /// Optional link target
    pub link_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_kind_round_trip() {
        for kind in [
            GrantKind::AuthorizationCode,
            GrantKind::AccessToken,
            GrantKind::RefreshToken,
            GrantKind::DeviceCode,
            GrantKind::ClientCredentials,
        ] {
            assert_eq!(GrantKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(GrantKind::parse("implicit"), None);
    }

    #[test]
    fn test_redirect_uri_exact_match_only() {
        let client = Client {
            id: "rec-1".into(),
            client_id: "client_abc".into(),
            client_secret_hash: None,
            redirect_uris: vec!["https://app.example.com/cb".into()],
            grant_types: vec!["authorization_code".into()],
            response_types: vec!["code".into()],
            scope: None,
            signing_alg: None,
            client_name: None,
            client_uri: None,
            logo_uri: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(client.redirect_uri_registered("https://app.example.com/cb"));
        assert!(!client.redirect_uri_registered("https://app.example.com/cb/"));
        assert!(!client.redirect_uri_registered("http://app.example.com/cb"));
    }
}
