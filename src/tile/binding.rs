//! Swappable reference from a slide to the cache it uses.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::cache::{TileCache, DEFAULT_CACHE_CAPACITY};

/// Indirection between a slide and its [`TileCache`].
///
/// Each binding starts with a private cache of [`DEFAULT_CACHE_CAPACITY`]
/// bytes. Binding a shared cache swaps the target under the binding's own
/// lock; the previous cache is released after that lock is dropped, so
/// tearing down the old cache never runs while the binding is locked and
/// never touches the cache's internal lock from here.
///
/// Threads that already fetched the old cache keep using it until they drop
/// their handle.
pub struct CacheBinding {
    cache: Mutex<Arc<TileCache>>,
}

impl CacheBinding {
    /// Create a binding to a fresh private cache.
    pub fn new() -> Self {
        Self::with_cache(TileCache::shared(DEFAULT_CACHE_CAPACITY))
    }

    /// Create a binding to an existing cache.
    pub fn with_cache(cache: Arc<TileCache>) -> Self {
        Self {
            cache: Mutex::new(cache),
        }
    }

    /// Current target cache.
    pub fn cache(&self) -> Arc<TileCache> {
        Arc::clone(&self.cache.lock())
    }

    /// Point the binding at `cache`.
    pub fn set(&self, cache: Arc<TileCache>) {
        let old = std::mem::replace(&mut *self.cache.lock(), cache);
        debug!(
            old_capacity = old.capacity(),
            old_shared_by = Arc::strong_count(&old) - 1,
            "Rebound tile cache"
        );
        drop(old);
    }
}

impl Default for CacheBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBinding")
            .field("cache", &*self.cache.lock())
            .finish()
    }
}
