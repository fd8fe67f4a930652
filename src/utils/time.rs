// ABOUTME: Bounded-time execution of store operations
// ABOUTME: Elapsed timeouts surface as StoreUnavailable instead of hanging the caller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::errors::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run a store operation under a deadline
///
/// An elapsed deadline means the outcome is unknown: the underlying write may
/// or may not have landed.
pub(crate) async fn bounded<T, F>(op: &'static str, timeout: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>> + Send,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation = op,
                timeout_ms = timeout.as_millis() as u64,
                "store operation timed out"
            );
            Err(AppError::store_unavailable(format!(
                "{op} did not complete within {}ms",
                timeout.as_millis()
            )))
        }
    }
}
