// ABOUTME: Shared helpers for integration tests
// ABOUTME: Logging init, in-memory and file-backed test databases, fixture builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

// Not every test binary uses every helper
#![allow(dead_code)]
#![allow(clippy::expect_used)]

use chrono::{DateTime, Duration, Utc};
use keyrelay::database_plugins::{factory, DatabaseProvider};
use keyrelay::models::{Grant, GrantKind};
use std::sync::Arc;
use std::sync::Once;
use uuid::Uuid;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging once per process
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("keyrelay=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Create a fresh in-memory database with migrations applied
pub async fn create_test_database() -> Arc<factory::Database> {
    init_test_logging();
    let database = factory::Database::new("sqlite::memory:")
        .await
        .expect("in-memory database should open");
    database.migrate().await.expect("migrations should apply");
    Arc::new(database)
}

/// Create a file-backed database for tests that need real cross-connection
/// concurrency; returns the tempdir so it outlives the pool
pub async fn create_file_test_database() -> (Arc<factory::Database>, tempfile::TempDir) {
    init_test_logging();
    let dir = tempfile::tempdir().expect("tempdir should create");
    let path = dir.path().join("keyrelay-test.db");
    let url = format!("sqlite:{}", path.display());
    let database = factory::Database::new(&url)
        .await
        .expect("file database should open");
    database.migrate().await.expect("migrations should apply");
    (Arc::new(database), dir)
}

/// Build a grant fixture expiring `ttl` from `now`
pub fn test_grant(id: &str, kind: GrantKind, now: DateTime<Utc>, ttl: Duration) -> Grant {
    Grant {
        id: id.to_string(),
        grant_id: Some(format!("family-{id}")),
        client_id: "client_test".to_string(),
        account_id: Some(Uuid::new_v4()),
        kind,
        jti: None,
        iat: now,
        exp: now + ttl,
        data: serde_json::json!({"scope": "openid profile"}),
        consumed: false,
        consumed_at: None,
    }
}
