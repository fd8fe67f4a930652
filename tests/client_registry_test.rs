// ABOUTME: Integration tests for the client registry
// ABOUTME: Registration validation, byte-exact redirect matching, lifecycle, cache coherence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::{Duration, Utc};
use common::{create_test_database, test_grant};
use keyrelay::clients::{ClientRegistrationRequest, ClientRegistry, ClientUpdate};
use keyrelay::database_plugins::factory;
use keyrelay::errors::ErrorCode;
use keyrelay::grants::GrantStore;
use keyrelay::models::GrantKind;
use std::sync::Arc;

fn registry(db: Arc<factory::Database>) -> ClientRegistry {
    ClientRegistry::with_defaults(db).unwrap()
}

fn request(redirect_uris: &[&str]) -> ClientRegistrationRequest {
    ClientRegistrationRequest {
        redirect_uris: redirect_uris.iter().map(ToString::to_string).collect(),
        client_name: "Test App".to_string(),
        grant_types: Vec::new(),
        response_types: Vec::new(),
        scope: Some("openid profile".to_string()),
        signing_alg: Some("RS256".to_string()),
        client_uri: None,
        logo_uri: None,
        token_endpoint_auth_method: None,
    }
}

#[tokio::test]
async fn registration_issues_credentials_and_defaults() {
    let registry = registry(create_test_database().await);
    let now = Utc::now();

    let response = registry
        .register(request(&["https://app.example.com/cb"]), now)
        .await
        .unwrap();

    assert!(response.client_id.starts_with("client_"));
    let secret = response.client_secret.clone().unwrap();
    assert!(!secret.is_empty());
    assert_eq!(
        response.grant_types,
        vec!["authorization_code", "refresh_token"]
    );
    assert_eq!(response.response_types, vec!["code"]);

    // The stored record carries a hash, never the plaintext secret
    let stored = registry.lookup(&response.client_id).await.unwrap();
    let hash = stored.client_secret_hash.unwrap();
    assert_ne!(hash, secret);
    assert!(hash.starts_with("$argon2"));
}

#[tokio::test]
async fn public_client_registration_issues_no_secret() {
    let registry = registry(create_test_database().await);
    let now = Utc::now();

    let mut public = request(&["https://app.example.com/cb"]);
    public.token_endpoint_auth_method = Some("none".to_string());
    let response = registry.register(public, now).await.unwrap();

    assert!(response.client_secret.is_none());
    let stored = registry.lookup(&response.client_id).await.unwrap();
    assert!(stored.client_secret_hash.is_none());

    // A public client has nothing to verify a secret against
    let err = registry
        .verify_secret(&response.client_id, "anything")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);
}

#[tokio::test]
async fn registration_rejects_unknown_auth_method() {
    let registry = registry(create_test_database().await);
    let mut bad = request(&["https://app.example.com/cb"]);
    bad.token_endpoint_auth_method = Some("private_key_jwt".to_string());
    let err = registry.register(bad, Utc::now()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);
}

#[tokio::test]
async fn secret_verification() {
    let registry = registry(create_test_database().await);
    let response = registry
        .register(request(&["https://app.example.com/cb"]), Utc::now())
        .await
        .unwrap();

    registry
        .verify_secret(&response.client_id, response.client_secret.as_deref().unwrap())
        .await
        .unwrap();

    let err = registry
        .verify_secret(&response.client_id, "not-the-secret")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);
}

#[tokio::test]
async fn registration_rejects_invalid_metadata() {
    let registry = registry(create_test_database().await);
    let now = Utc::now();

    let mut no_uris = request(&[]);
    no_uris.redirect_uris.clear();
    let err = registry.register(no_uris, now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);

    let err = registry
        .register(request(&["not a uri"]), now)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);

    let mut bad_grant = request(&["https://app.example.com/cb"]);
    bad_grant.grant_types = vec!["implicit".to_string()];
    let err = registry.register(bad_grant, now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);

    let mut bad_scope = request(&["https://app.example.com/cb"]);
    bad_scope.scope = Some("openid admin".to_string());
    let err = registry.register(bad_scope, now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);
}

#[tokio::test]
async fn redirect_matching_is_byte_exact() {
    let registry = registry(create_test_database().await);
    let response = registry
        .register(request(&["https://app.example.com/cb"]), Utc::now())
        .await
        .unwrap();
    let id = &response.client_id;

    registry
        .authorize_redirect(id, "https://app.example.com/cb")
        .await
        .unwrap();

    // Trailing slash is a different byte sequence
    let err = registry
        .authorize_redirect(id, "https://app.example.com/cb/")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RedirectMismatch);

    // Scheme downgrade
    let err = registry
        .authorize_redirect(id, "http://app.example.com/cb")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RedirectMismatch);

    // Case difference in the host
    let err = registry
        .authorize_redirect(id, "https://App.example.com/cb")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RedirectMismatch);

    // Prefix of a registered URI
    let err = registry
        .authorize_redirect(id, "https://app.example.com/")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RedirectMismatch);
}

#[tokio::test]
async fn update_is_visible_immediately_despite_cache() {
    let registry = registry(create_test_database().await);
    let now = Utc::now();
    let response = registry
        .register(request(&["https://app.example.com/cb"]), now)
        .await
        .unwrap();
    let id = &response.client_id;

    // Warm the cache
    registry.lookup(id).await.unwrap();

    let update = ClientUpdate {
        redirect_uris: Some(vec!["https://app.example.com/v2/cb".to_string()]),
        ..ClientUpdate::default()
    };
    registry.update(id, update, now).await.unwrap();

    // The old URI no longer authorizes; the new one does
    let err = registry
        .authorize_redirect(id, "https://app.example.com/cb")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RedirectMismatch);
    registry
        .authorize_redirect(id, "https://app.example.com/v2/cb")
        .await
        .unwrap();
}

#[tokio::test]
async fn update_rejects_invalid_replacement() {
    let registry = registry(create_test_database().await);
    let now = Utc::now();
    let response = registry
        .register(request(&["https://app.example.com/cb"]), now)
        .await
        .unwrap();

    let update = ClientUpdate {
        redirect_uris: Some(vec!["https://*.example.com/cb".to_string()]),
        ..ClientUpdate::default()
    };
    let err = registry
        .update(&response.client_id, update, now)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidClientSpec);
}

#[tokio::test]
async fn delete_refused_while_live_grants_exist() {
    let db = create_test_database().await;
    let registry = registry(db.clone());
    let grants = GrantStore::new(db, std::time::Duration::from_secs(5));
    let now = Utc::now();

    let response = registry
        .register(request(&["https://app.example.com/cb"]), now)
        .await
        .unwrap();

    let mut grant = test_grant("g-1", GrantKind::RefreshToken, now, Duration::days(30));
    grant.client_id.clone_from(&response.client_id);
    grants.put(&grant).await.unwrap();

    let err = registry
        .delete(&response.client_id, false, now)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ClientInUse);

    // Cascade revokes the grants and removes the client
    registry.delete(&response.client_id, true, now).await.unwrap();
    assert_eq!(
        registry.lookup(&response.client_id).await.unwrap_err().code,
        ErrorCode::NotFound
    );
    let later = now + Duration::seconds(1);
    assert_eq!(grants.get("g-1", later).await.unwrap_err().code, ErrorCode::NotFound);
}

#[tokio::test]
async fn delete_allowed_once_grants_have_expired() {
    let db = create_test_database().await;
    let registry = registry(db.clone());
    let grants = GrantStore::new(db, std::time::Duration::from_secs(5));
    let now = Utc::now();

    let response = registry
        .register(request(&["https://app.example.com/cb"]), now)
        .await
        .unwrap();

    let mut grant = test_grant("g-short", GrantKind::AuthorizationCode, now, Duration::minutes(10));
    grant.client_id.clone_from(&response.client_id);
    grants.put(&grant).await.unwrap();

    // Refused while the grant is live, allowed once the clock passes expiry
    let err = registry
        .delete(&response.client_id, false, now)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ClientInUse);

    let later = now + Duration::minutes(11);
    registry.delete(&response.client_id, false, later).await.unwrap();
    assert_eq!(
        registry.lookup(&response.client_id).await.unwrap_err().code,
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn delete_of_unknown_client_is_not_found() {
    let registry = registry(create_test_database().await);
    let now = Utc::now();

    let err = registry.delete("client_missing", false, now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = registry.delete("client_missing", true, now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn deleted_client_not_served_from_cache() {
    let registry = registry(create_test_database().await);
    let now = Utc::now();
    let response = registry
        .register(request(&["https://app.example.com/cb"]), now)
        .await
        .unwrap();

    registry.lookup(&response.client_id).await.unwrap();
    registry.delete(&response.client_id, false, now).await.unwrap();

    let err = registry.lookup(&response.client_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}
