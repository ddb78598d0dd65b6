//! Memoization of analysis results.

use crate::errors::AnalysisResult;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A concurrent map from keys to lazily computed values.
///
/// Every key is computed at most once, even when requested concurrently:
/// late requesters block on the key's cell until the first one is done.
/// The map shard is never locked while computing, so a computation may
/// itself request other keys of the same cache. Failed computations are
/// not recorded and will be attempted again by the next request.
pub struct ResultCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<Arc<V>>>>,
    computations: AtomicUsize,
    hits: AtomicUsize,
}

impl<K: Eq + Hash, V> Default for ResultCache<K, V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            computations: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }
}

impl<K: Eq + Hash, V> ResultCache<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `key`, computing it with `compute` if no value
    /// has been recorded yet.
    ///
    /// # Errors
    ///
    /// Propagates `compute` errors.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> AnalysisResult<Arc<V>>
    where
        F: FnOnce() -> AnalysisResult<V>,
    {
        // the shard guard is a temporary of this statement
        let cell = Arc::clone(&self.entries.entry(key).or_default());

        let mut computed = false;
        let value = cell.get_or_try_init(|| {
            computed = true;
            self.computations.fetch_add(1, Ordering::Relaxed);
            log::debug!("cache miss, computing");
            compute().map(Arc::new)
        })?;
        if !computed {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("cache hit");
        }
        Ok(Arc::clone(value))
    }

    /// Returns the value of `key` if it has already been computed.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries
            .get(key)
            .and_then(|cell| cell.get().map(Arc::clone))
    }

    /// Number of computations started so far.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
