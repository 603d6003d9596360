//! In-process keyed locking with timeouts
//!
//! Every read-modify-write of a concept row or a user's progress runs under
//! the lock for that key. Acquisition is bounded by a timeout; a caller that
//! cannot get the lock in time gets [`Error::LockTimeout`] instead of waiting
//! forever.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Idle entries are pruned once the map grows past this size
const PRUNE_THRESHOLD: usize = 1024;

/// A map of per-key async mutexes
#[derive(Debug, Default)]
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held lock for one key; released on drop
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting at most `timeout`
    pub async fn acquire(&self, key: &str, timeout: Duration) -> Result<KeyGuard> {
        let mutex = {
            let mut entries = self.entries.lock().await;
            if entries.len() > PRUNE_THRESHOLD {
                entries.retain(|_, m| Arc::strong_count(m) > 1);
            }
            entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(key = %key, "Lock acquired");
                Ok(KeyGuard {
                    key: key.to_string(),
                    _guard: guard,
                })
            }
            Err(_) => {
                warn!(key = %key, timeout_ms = timeout.as_millis() as u64, "Lock acquisition timed out");
                Err(Error::LockTimeout(key.to_string()))
            }
        }
    }

    /// Number of keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Acquire a single unkeyed mutex with a timeout
pub async fn acquire_within<'a>(
    mutex: &'a Mutex<()>,
    name: &str,
    timeout: Duration,
) -> Result<tokio::sync::MutexGuard<'a, ()>> {
    tokio::time::timeout(timeout, mutex.lock())
        .await
        .map_err(|_| {
            warn!(lock = %name, "Lock acquisition timed out");
            Error::LockTimeout(name.to_string())
        })
}

/// Run a store call with a deadline
pub async fn store_call<T, F>(operation: &str, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation = %operation, "Store call timed out");
            Err(Error::StoreTimeout(operation.to_string()))
        }
    }
}
