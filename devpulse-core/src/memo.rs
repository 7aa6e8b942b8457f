//! Process-lifetime memoization for asynchronous retrievals.
//!
//! Each key maps to a shared cell. The first caller for a key runs the
//! retrieval inside the cell; callers arriving while it is in flight wait on
//! the same cell instead of starting a second retrieval. Entries are never
//! evicted.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

/// Memo table from structural keys to shared results.
pub struct Memo<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty memo table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value for `key`, running `fetch` only if no caller has
    /// produced it yet.
    ///
    /// A failed retrieval leaves the entry empty and hands the error to the
    /// caller that ran it; a later call for the same key retries.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cells.entry(key).or_default())
        };
        let value = cell
            .get_or_try_init(|| async move { fetch().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(value))
    }

    /// Number of keys that have been requested.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
