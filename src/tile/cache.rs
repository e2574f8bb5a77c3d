//! Byte-budgeted LRU cache for decoded tiles.
//!
//! One cache may serve several open slides at once. Entries are keyed by the
//! plane they belong to plus their tile coordinates, and the total size of all
//! resident entries never exceeds the cache capacity.
//!
//! # Layout
//!
//! ```text
//!   map: CacheKey ──► slot index
//!
//!   slots: [ Slot ][ Slot ][ free ][ Slot ] ...
//!              ▲                      │
//!   head (MRU) ┘     prev/next links  └─► tail (LRU)
//! ```
//!
//! The recency list is threaded through a slab of slots by index, so a hit is
//! one map lookup plus an unlink/relink. Freed slots are recycled.
//!
//! # Entry Lifetime
//!
//! A [`CacheEntry`] is a shared handle to a decoded buffer. The cache holds one
//! handle while the entry is resident and every caller holds another. Eviction
//! only drops the cache's handle, so a buffer a caller is still reading stays
//! valid until that caller drops its entry.
//!
//! # Locking
//!
//! Every operation, including `get`, takes the cache mutex because a hit
//! reorders the recency list. Decoding happens outside the lock; two threads
//! missing on the same key may both decode and the later `put` replaces the
//! earlier entry.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use super::buffer::TileBuffer;

/// Default cache capacity: 32MB
pub const DEFAULT_CACHE_CAPACITY: u64 = 32 * 1024 * 1024;

/// Link value meaning "no slot".
const NIL: usize = usize::MAX;

// =============================================================================
// Cache Key
// =============================================================================

/// Identity of one tiled plane (a level of one open slide).
///
/// Plane ids are process-unique, so slides sharing a cache never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneId(u64);

static NEXT_PLANE_ID: AtomicU64 = AtomicU64::new(1);

impl PlaneId {
    /// Allocate a fresh plane id.
    pub fn next() -> Self {
        Self(NEXT_PLANE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Cache key for a decoded tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Plane the tile belongs to
    pub plane: PlaneId,

    /// Tile column
    pub x: i64,

    /// Tile row
    pub y: i64,
}

impl CacheKey {
    pub fn new(plane: PlaneId, x: i64, y: i64) -> Self {
        Self { plane, x, y }
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

struct EntryInner {
    data: TileBuffer,
    size: u64,
}

/// Shared handle to a decoded tile buffer.
///
/// Cloning adds a reference and dropping releases one; the buffer is freed
/// when the last reference goes, whether or not the entry is still cached.
#[derive(Clone)]
pub struct CacheEntry {
    inner: Arc<EntryInner>,
}

impl CacheEntry {
    /// Wrap a buffer, charging `size` bytes against a cache's capacity.
    pub fn new(data: TileBuffer, size: u64) -> Self {
        Self {
            inner: Arc::new(EntryInner { data, size }),
        }
    }

    pub fn data(&self) -> &TileBuffer {
        &self.inner.data
    }

    /// Size charged against the cache capacity.
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    /// Number of live handles to this entry, the cache's own included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether two handles point at the same buffer.
    pub fn ptr_eq(&self, other: &CacheEntry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Deref for CacheEntry {
    type Target = TileBuffer;

    fn deref(&self) -> &TileBuffer {
        &self.inner.data
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("width", &self.inner.data.width())
            .field("height", &self.inner.data.height())
            .field("size", &self.inner.size)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

// =============================================================================
// LRU State
// =============================================================================

struct Slot {
    key: CacheKey,
    entry: Option<CacheEntry>,
    prev: usize,
    next: usize,
}

/// Everything guarded by the cache mutex.
struct LruState {
    map: HashMap<CacheKey, usize>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    total_size: u64,
}

impl LruState {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            total_size: 0,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);

        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }

        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;

        if self.head == NIL {
            self.tail = idx;
        } else {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
    }

    fn insert_front(&mut self, key: CacheKey, entry: CacheEntry) {
        let size = entry.size();
        let slot = Slot {
            key,
            entry: Some(entry),
            prev: NIL,
            next: NIL,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        self.push_front(idx);
        self.map.insert(key, idx);
        self.total_size += size;
    }

    fn remove(&mut self, idx: usize) -> Option<CacheEntry> {
        self.unlink(idx);
        self.map.remove(&self.slots[idx].key);
        self.free.push(idx);

        let entry = self.slots[idx].entry.take()?;
        self.total_size -= entry.size();
        Some(entry)
    }

    fn pop_lru(&mut self) -> Option<(CacheKey, CacheEntry)> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        let key = self.slots[idx].key;
        self.remove(idx).map(|entry| (key, entry))
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Thread-safe LRU cache of decoded tiles, bounded by total byte size.
///
/// Share one cache between slides by wrapping it in an `Arc` (see
/// [`TileCache::shared`]); the cache is destroyed with its last handle.
///
/// # Example
///
/// ```
/// use vsf_slide::tile::{CacheKey, PlaneId, TileBuffer, TileCache};
///
/// let cache = TileCache::new(1024);
/// let key = CacheKey::new(PlaneId::next(), 0, 0);
///
/// let buffer = TileBuffer::transparent(8, 8).unwrap();
/// let entry = cache.put(key, buffer, 256);
///
/// let hit = cache.get(&key).unwrap();
/// assert!(hit.ptr_eq(&entry));
/// assert_eq!(cache.size(), 256);
/// ```
pub struct TileCache {
    state: Mutex<LruState>,
    capacity: u64,
    warned_oversize: AtomicBool,
}

impl TileCache {
    /// Create an empty cache holding at most `capacity` bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            state: Mutex::new(LruState::new()),
            capacity,
            warned_oversize: AtomicBool::new(false),
        }
    }

    /// Create an empty cache behind an `Arc`, ready to be shared.
    pub fn shared(capacity: u64) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Look up a tile.
    ///
    /// A hit moves the entry to the most-recently-used position and returns a
    /// new handle to it. A miss changes nothing.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut state = self.state.lock();
        let idx = *state.map.get(key)?;

        state.unlink(idx);
        state.push_front(idx);
        state.slots[idx].entry.clone()
    }

    /// Check if a tile is cached without updating LRU order.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().map.contains_key(key)
    }

    /// Store a decoded tile and return the caller's handle to it.
    ///
    /// # Arguments
    ///
    /// * `key` - Plane and tile coordinates
    /// * `data` - Decoded pixels
    /// * `size` - Bytes to charge against the capacity
    ///
    /// # Returns
    ///
    /// A handle that stays valid regardless of what the cache later does.
    /// When `size` exceeds the capacity the entry is not cached at all and a
    /// warning is logged the first time this happens. Otherwise
    /// least-recently-used entries are evicted until the new one fits, and an
    /// existing entry under the same key is replaced.
    pub fn put(&self, key: CacheKey, data: TileBuffer, size: u64) -> CacheEntry {
        let entry = CacheEntry::new(data, size);

        if size > self.capacity {
            if !self.warned_oversize.swap(true, Ordering::Relaxed) {
                warn!(
                    size,
                    capacity = self.capacity,
                    "Tile larger than cache capacity, not caching (further occurrences are not logged)"
                );
            }
            return entry;
        }

        // Released after the lock is dropped
        let mut released = Vec::new();
        {
            let mut state = self.state.lock();

            if let Some(&idx) = state.map.get(&key) {
                released.extend(state.remove(idx));
            }

            while state.total_size + size > self.capacity {
                match state.pop_lru() {
                    Some((evicted_key, evicted)) => {
                        trace!(
                            plane = evicted_key.plane.get(),
                            x = evicted_key.x,
                            y = evicted_key.y,
                            size = evicted.size(),
                            "Evicted tile"
                        );
                        released.push(evicted);
                    }
                    None => break,
                }
            }

            state.insert_front(key, entry.clone());
        }
        drop(released);

        entry
    }

    /// Remove a tile from the cache.
    ///
    /// Returns the cache's handle if the tile was resident.
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut state = self.state.lock();
        let idx = *state.map.get(key)?;
        state.remove(idx)
    }

    /// Clear all entries from the cache.
    ///
    /// Callers holding entries keep them.
    pub fn clear(&self) {
        let old = std::mem::replace(&mut *self.state.lock(), LruState::new());
        drop(old);
    }

    /// Get the current number of cached tiles.
    pub fn len(&self) -> usize {
        self.state.lock().map.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().map.is_empty()
    }

    /// Get the current total size of cached tiles in bytes.
    pub fn size(&self) -> u64 {
        self.state.lock().total_size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        let state = self.state.lock();
        let mut keys = Vec::with_capacity(state.map.len());
        let mut idx = state.head;
        while idx != NIL {
            keys.push(state.slots[idx].key);
            idx = state.slots[idx].next;
        }
        keys
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TileCache")
            .field("capacity", &self.capacity)
            .field("total_size", &state.total_size)
            .field("len", &state.map.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
