// ABOUTME: Integration tests for the grant record store
// ABOUTME: Covers single-use consumption races, expiry hiding, family revocation, sweeps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::{Duration, Utc};
use common::{create_file_test_database, create_test_database, test_grant};
use keyrelay::errors::ErrorCode;
use keyrelay::grants::GrantStore;
use keyrelay::models::GrantKind;

fn store(db: std::sync::Arc<keyrelay::database_plugins::factory::Database>) -> GrantStore {
    GrantStore::new(db, std::time::Duration::from_secs(5))
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let store = store(create_test_database().await);
    let now = Utc::now();
    let grant = test_grant("code-1", GrantKind::AuthorizationCode, now, Duration::minutes(10));

    store.put(&grant).await.unwrap();
    let fetched = store.get("code-1", now).await.unwrap();

    assert_eq!(fetched.id, grant.id);
    assert_eq!(fetched.kind, GrantKind::AuthorizationCode);
    assert_eq!(fetched.client_id, grant.client_id);
    assert_eq!(fetched.data, grant.data);
    assert!(!fetched.consumed);
}

#[tokio::test]
async fn duplicate_id_is_rejected() {
    let store = store(create_test_database().await);
    let now = Utc::now();
    let grant = test_grant("dup", GrantKind::AccessToken, now, Duration::minutes(10));

    store.put(&grant).await.unwrap();
    let err = store.put(&grant).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::DuplicateId);
}

#[tokio::test]
async fn expired_grant_reads_as_not_found() {
    let store = store(create_test_database().await);
    let now = Utc::now();
    let grant = test_grant("short", GrantKind::AuthorizationCode, now, Duration::seconds(30));
    store.put(&grant).await.unwrap();

    let later = now + Duration::seconds(31);
    let err = store.get("short", later).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    // Consuming an expired grant is also NotFound, never AlreadyConsumed
    let err = store.consume("short", later).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn consume_is_single_use() {
    let store = store(create_test_database().await);
    let now = Utc::now();
    let grant = test_grant("once", GrantKind::AuthorizationCode, now, Duration::minutes(10));
    store.put(&grant).await.unwrap();

    let consumed = store.consume("once", now).await.unwrap();
    assert!(consumed.consumed);
    assert!(consumed.consumed_at.is_some());

    let err = store.consume("once", now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AlreadyConsumed);
}

#[tokio::test]
async fn consumed_grant_remains_readable_until_expiry() {
    let store = store(create_test_database().await);
    let now = Utc::now();
    let grant = test_grant("spent", GrantKind::RefreshToken, now, Duration::minutes(10));
    store.put(&grant).await.unwrap();

    store.consume("spent", now).await.unwrap();

    let fetched = store.get("spent", now).await.unwrap();
    assert!(fetched.consumed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_consume_has_exactly_one_winner() {
    let (db, _dir) = create_file_test_database().await;
    let store = store(db);
    let now = Utc::now();
    let grant = test_grant("race", GrantKind::AuthorizationCode, now, Duration::minutes(10));
    store.put(&grant).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move { store.consume("race", now).await }));
    }

    let mut winners = 0;
    let mut losers = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(grant) => {
                assert!(grant.consumed);
                winners += 1;
            }
            Err(err) => {
                assert_eq!(err.code, ErrorCode::AlreadyConsumed);
                losers += 1;
            }
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(losers, 15);
}

#[tokio::test]
async fn consume_times_out_as_store_unavailable_when_store_is_stalled() {
    let (db, _dir) = create_file_test_database().await;
    let store = GrantStore::new(db.clone(), std::time::Duration::from_millis(200));
    let now = Utc::now();
    let grant = test_grant("stalled", GrantKind::AuthorizationCode, now, Duration::minutes(10));
    store.put(&grant).await.unwrap();

    // Hold the write lock from another connection so the consume UPDATE
    // blocks past the operation deadline
    let keyrelay::database_plugins::factory::Database::Sqlite(sqlite) = db.as_ref();
    let pool = sqlite.inner().pool();
    let mut holder = pool.acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *holder)
        .await
        .unwrap();

    let err = store.consume("stalled", now).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::StoreUnavailable);

    sqlx::query("ROLLBACK").execute(&mut *holder).await.unwrap();
    drop(holder);

    // The timed-out attempt left no partial state behind
    let fetched = store.get("stalled", now).await.unwrap();
    assert!(!fetched.consumed);
    let consumed = store.consume("stalled", now).await.unwrap();
    assert!(consumed.consumed);
}

#[tokio::test]
async fn revoke_family_expires_all_members() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let mut access = test_grant("at-1", GrantKind::AccessToken, now, Duration::minutes(10));
    access.grant_id = Some("family-a".to_string());
    let mut refresh = test_grant("rt-1", GrantKind::RefreshToken, now, Duration::days(30));
    refresh.grant_id = Some("family-a".to_string());
    let mut other = test_grant("at-2", GrantKind::AccessToken, now, Duration::minutes(10));
    other.grant_id = Some("family-b".to_string());

    store.put(&access).await.unwrap();
    store.put(&refresh).await.unwrap();
    store.put(&other).await.unwrap();

    let revoked = store.revoke_family("family-a", now).await.unwrap();
    assert_eq!(revoked, 2);

    let later = now + Duration::seconds(1);
    assert_eq!(store.get("at-1", later).await.unwrap_err().code, ErrorCode::NotFound);
    assert_eq!(store.get("rt-1", later).await.unwrap_err().code, ErrorCode::NotFound);
    // The other family is untouched
    assert!(store.get("at-2", later).await.is_ok());

    // Revocation is idempotent
    let again = store.revoke_family("family-a", later).await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn sweep_removes_only_past_expiry() {
    let store = store(create_test_database().await);
    let now = Utc::now();

    let dead = test_grant("dead", GrantKind::AccessToken, now - Duration::minutes(20), Duration::minutes(10));
    let live = test_grant("live", GrantKind::AccessToken, now, Duration::minutes(10));
    let boundary = test_grant("edge", GrantKind::AccessToken, now - Duration::minutes(10), Duration::minutes(10));

    store.put(&dead).await.unwrap();
    store.put(&live).await.unwrap();
    store.put(&boundary).await.unwrap();

    // "edge" expires exactly at now, so the <= boundary removes it too
    let removed = store.sweep_expired(now).await.unwrap();
    assert_eq!(removed, 2);

    assert!(store.get("live", now).await.is_ok());
}
