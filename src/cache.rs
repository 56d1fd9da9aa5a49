//! Deduplicating cache for query service results.
//!
//! Entries are keyed by an operation tag plus the canonical JSON encoding of
//! the operation's arguments, so structurally equal requests share one slot
//! regardless of how the argument values were produced. Each slot is a
//! single-assignment cell: the first fetch populates it, every later lookup
//! (and every concurrent one) reuses the stored value. Nothing is ever
//! evicted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::{LakeviewError, Result};

/// Cache key: operation tag and canonical argument encoding.
type CacheKey = (String, String);

/// Write-once result cache with request deduplication.
pub struct ResultCache<T> {
    cells: Mutex<HashMap<CacheKey, Arc<OnceCell<T>>>>,
}

impl<T> ResultCache<T> {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `(op, args)`, running `fetch` to produce
    /// it on the first lookup.
    ///
    /// Concurrent lookups for the same key await a single in-flight fetch and
    /// share its result. A failed fetch leaves the slot unset, so the next
    /// lookup retries instead of caching the error.
    pub async fn get_or_fetch<A, F, Fut>(&self, op: &str, args: &A, fetch: F) -> Result<T>
    where
        T: Clone,
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = (op.to_string(), canonical_args(args)?);
        let cell = {
            let mut cells = self
                .cells
                .lock()
                .map_err(|_| LakeviewError::internal("Result cache lock poisoned"))?;
            Arc::clone(cells.entry(key).or_default())
        };
        cell.get_or_try_init(fetch).await.cloned()
    }

    /// Number of slots, counting in-flight fetches.
    pub fn len(&self) -> usize {
        self.cells.lock().map(|cells| cells.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical encoding used for the argument half of the key.
fn canonical_args<A: Serialize + ?Sized>(args: &A) -> Result<String> {
    serde_json::to_string(args)
        .map_err(|e| LakeviewError::internal(format!("Failed to encode cache key: {e}")))
}
