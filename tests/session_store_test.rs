// ABOUTME: Integration tests for the session store
// ABOUTME: Lifecycle, payload updates, sliding expiry, and expiry hiding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::{Duration, Utc};
use common::create_test_database;
use keyrelay::database_plugins::factory;
use keyrelay::errors::ErrorCode;
use keyrelay::sessions::SessionStore;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn store(db: Arc<factory::Database>) -> SessionStore {
    SessionStore::new(db, Duration::hours(1), std::time::Duration::from_secs(5))
}

#[tokio::test]
async fn create_issues_opaque_id_and_round_trips() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let session = store
        .create(json!({"flow": "authorize"}), None, now)
        .await
        .unwrap();

    assert!(session.id.len() >= 32);
    assert!(session.account_id.is_none());
    assert_eq!(session.expires_at, now + Duration::hours(1));

    let fetched = store.get(&session.id, now).await.unwrap();
    assert_eq!(fetched.data, json!({"flow": "authorize"}));
}

#[tokio::test]
async fn two_sessions_get_distinct_ids() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let a = store.create(json!({}), None, now).await.unwrap();
    let b = store.create(json!({}), None, now).await.unwrap();
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn expired_session_reads_as_not_found() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let session = store
        .create(json!({}), Some(Duration::minutes(5)), now)
        .await
        .unwrap();

    let later = now + Duration::minutes(6);
    let err = store.get(&session.id, later).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    // Touch cannot resurrect an expired session
    let err = store
        .touch(&session.id, None, later)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn update_mutates_payload_atomically() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let session = store
        .create(json!({"counter": 0}), None, now)
        .await
        .unwrap();

    let updated = store
        .update(&session.id, now, |data| {
            data["counter"] = json!(1);
            data["nonce"] = json!("abc");
        })
        .await
        .unwrap();
    assert_eq!(updated.data, json!({"counter": 1, "nonce": "abc"}));

    let fetched = store.get(&session.id, now).await.unwrap();
    assert_eq!(fetched.data, json!({"counter": 1, "nonce": "abc"}));
}

#[tokio::test]
async fn attach_account_binds_identity() {
    let store = store(create_test_database().await);
    let now = Utc::now();
    let account = Uuid::new_v4();

    let session = store.create(json!({}), None, now).await.unwrap();
    store.attach_account(&session.id, account, now).await.unwrap();

    let fetched = store.get(&session.id, now).await.unwrap();
    assert_eq!(fetched.account_id, Some(account));
}

#[tokio::test]
async fn touch_slides_expiry_forward() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let session = store
        .create(json!({}), Some(Duration::minutes(5)), now)
        .await
        .unwrap();

    let mid = now + Duration::minutes(4);
    store.touch(&session.id, Some(Duration::minutes(5)), mid).await.unwrap();

    // Past the original expiry, still alive thanks to the touch
    let past_original = now + Duration::minutes(6);
    assert!(store.get(&session.id, past_original).await.is_ok());

    // Past the slid expiry, gone
    let past_slid = mid + Duration::minutes(6);
    assert_eq!(
        store.get(&session.id, past_slid).await.unwrap_err().code,
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let session = store.create(json!({}), None, now).await.unwrap();
    store.destroy(&session.id).await.unwrap();
    // Second destroy of the same id is a silent no-op
    store.destroy(&session.id).await.unwrap();

    assert_eq!(
        store.get(&session.id, now).await.unwrap_err().code,
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn sweep_removes_expired_sessions_only() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let dead = store
        .create(json!({}), Some(Duration::minutes(5)), now - Duration::minutes(10))
        .await
        .unwrap();
    let live = store.create(json!({}), None, now).await.unwrap();

    let removed = store.sweep_expired(now).await.unwrap();
    assert_eq!(removed, 1);

    assert!(store.get(&live.id, now).await.is_ok());
    assert_eq!(
        store.get(&dead.id, now).await.unwrap_err().code,
        ErrorCode::NotFound
    );
}
