//! Open VSF slide handle.
//!
//! # Tile Pipeline
//!
//! ```text
//! read_tile(level, col, row)
//!   │
//!   ├─ cache.get(plane, col, row) ──hit──► TileHandle
//!   │
//!   └─ miss
//!       ├─ record memoised on the level? ──no──► locate + dimensions
//!       ├─ size == 0 ? transparent buffer : decode
//!       └─ cache.put ─────────────────────────► TileHandle
//! ```
//!
//! The cache lock is only held inside `get` and `put`; locating and decoding
//! run unlocked, so concurrent misses on one tile may decode it twice.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{FormatError, TileError};
use crate::format::check;
use crate::format::vsf::{level_file_path, locate, IndexDescriptor};
use crate::io::LocalFileReader;
use crate::tile::{CacheBinding, CacheEntry, CacheKey, TileBuffer, TileCache, TileDecoder};

use super::properties::Properties;
use super::reader::{Level, LevelInfo, TileRecord};

// =============================================================================
// TileHandle
// =============================================================================

/// A decoded tile held by the caller.
///
/// The pixels stay valid for as long as the handle lives, even if the tile is
/// evicted from the cache meanwhile.
#[derive(Debug, Clone)]
pub struct TileHandle {
    entry: CacheEntry,
    cache_hit: bool,
}

impl TileHandle {
    /// Whether the tile was served from the cache.
    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn into_entry(self) -> CacheEntry {
        self.entry
    }
}

impl Deref for TileHandle {
    type Target = TileBuffer;

    fn deref(&self) -> &TileBuffer {
        self.entry.data()
    }
}

// =============================================================================
// VsfSlide
// =============================================================================

/// An open VSF slide.
///
/// Opening parses the index, checks that every level and focal-plane file
/// exists, and builds the level table; any failure aborts the open. After
/// that, tiles can be read from any number of threads.
///
/// # Example
///
/// ```no_run
/// use vsf_slide::slide::VsfSlide;
///
/// let slide = VsfSlide::open("case7.vsf")?;
/// let tile = slide.read_tile(0, 3, 2)?;
/// println!("{}x{} (cached: {})", tile.width(), tile.height(), tile.cache_hit());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct VsfSlide {
    path: PathBuf,
    descriptor: IndexDescriptor,
    levels: Vec<Level>,
    properties: Properties,
    binding: CacheBinding,
}

impl VsfSlide {
    /// Open a slide with its own private cache.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        Self::open_with_binding(path.as_ref(), CacheBinding::new())
    }

    /// Open a slide that reads through a shared cache.
    pub fn open_with_cache(
        path: impl AsRef<Path>,
        cache: Arc<TileCache>,
    ) -> Result<Self, FormatError> {
        Self::open_with_binding(path.as_ref(), CacheBinding::with_cache(cache))
    }

    fn open_with_binding(path: &Path, binding: CacheBinding) -> Result<Self, FormatError> {
        let descriptor = check(path)?;

        let mut levels = Vec::with_capacity(usize::from(descriptor.level_count));
        for layer in 0..descriptor.level_count {
            let level_path = level_file_path(path, descriptor.version, layer, 0)?;
            levels.push(Level::new(layer, &descriptor, level_path)?);
        }
        levels.sort_by(|a, b| b.dimensions().0.cmp(&a.dimensions().0));

        let properties = Properties::collect(&descriptor, path, &levels);

        debug!(
            path = %path.display(),
            version = %descriptor.version,
            width = descriptor.width,
            height = descriptor.height,
            levels = levels.len(),
            "Opened VSF slide"
        );

        Ok(Self {
            path: path.to_path_buf(),
            descriptor,
            levels,
            properties,
            binding,
        })
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Level `level`, where 0 is the full-resolution level.
    pub fn level(&self, level: usize) -> Option<&Level> {
        self.levels.get(level)
    }

    /// Cache tiles are currently read through.
    pub fn cache(&self) -> Arc<TileCache> {
        self.binding.cache()
    }

    /// Switch to another cache. Reads already in flight finish on the old one.
    pub fn set_cache(&self, cache: Arc<TileCache>) {
        self.binding.set(cache);
    }

    // -------------------------------------------------------------------------
    // Level queries
    // -------------------------------------------------------------------------

    /// Get the number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Get dimensions of the full-resolution (level 0) image.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(Level::dimensions)
    }

    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.levels.get(level).map(Level::dimensions)
    }

    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels.get(level).map(Level::downsample)
    }

    /// Get tile size for a level. Edge tiles may be smaller.
    pub fn tile_size(&self, level: usize) -> Option<(u32, u32)> {
        self.levels.get(level).map(Level::tile_size)
    }

    /// Get the number of tiles in X and Y directions for a level.
    pub fn tile_count(&self, level: usize) -> Option<(u32, u32)> {
        self.levels.get(level).map(Level::tile_count)
    }

    pub fn level_info(&self, level: usize) -> Option<LevelInfo> {
        self.levels.get(level).map(Level::info)
    }

    /// Find the best level for a given downsample factor.
    ///
    /// Returns the level with the smallest downsample that is >= the
    /// requested factor, or the lowest resolution level if none is.
    pub fn best_level_for_downsample(&self, downsample: f64) -> Option<usize> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.downsample() >= downsample * 0.99) // Small tolerance
            .min_by(|(_, a), (_, b)| a.downsample().total_cmp(&b.downsample()))
            .map(|(i, _)| i)
            .or_else(|| self.levels.len().checked_sub(1))
    }

    // -------------------------------------------------------------------------
    // Tile access
    // -------------------------------------------------------------------------

    /// Read one tile, from the cache when possible.
    ///
    /// # Arguments
    ///
    /// * `level` - Pyramid level index (0 = highest resolution)
    /// * `col` - Tile column
    /// * `row` - Tile row
    ///
    /// # Errors
    ///
    /// Any error affects this request only; the slide and the cache remain
    /// usable.
    pub fn read_tile(&self, level: usize, col: u32, row: u32) -> Result<TileHandle, TileError> {
        let lvl = self.level_checked(level)?;
        let tile_index = lvl
            .tile_index(col, row)
            .ok_or_else(|| out_of_bounds(level, lvl, col, row))?;

        let key = CacheKey::new(lvl.plane(), i64::from(col), i64::from(row));
        let cache = self.binding.cache();

        if let Some(entry) = cache.get(&key) {
            return Ok(TileHandle {
                entry,
                cache_hit: true,
            });
        }

        let record = self.resolve_record(lvl, tile_index, col, row)?;
        let buffer = if record.is_empty() {
            TileBuffer::transparent(record.width, record.height)?
        } else {
            self.decoder()?
                .decode(lvl.path(), record.location(), record.width, record.height)?
        };

        let size = buffer.size_bytes();
        let entry = cache.put(key, buffer, size);

        Ok(TileHandle {
            entry,
            cache_hit: false,
        })
    }

    /// Run `f` on a tile's pixels and release the tile afterwards.
    pub fn with_tile<T>(
        &self,
        level: usize,
        col: u32,
        row: u32,
        f: impl FnOnce(&TileBuffer) -> T,
    ) -> Result<T, TileError> {
        let tile = self.read_tile(level, col, row)?;
        Ok(f(&tile))
    }

    /// Location and pixel size of a tile, without decoding it.
    pub fn tile_record(&self, level: usize, col: u32, row: u32) -> Result<TileRecord, TileError> {
        let lvl = self.level_checked(level)?;
        let tile_index = lvl
            .tile_index(col, row)
            .ok_or_else(|| out_of_bounds(level, lvl, col, row))?;
        self.resolve_record(lvl, tile_index, col, row)
    }

    fn level_checked(&self, level: usize) -> Result<&Level, TileError> {
        self.levels.get(level).ok_or(TileError::InvalidLevel {
            level,
            max_levels: self.levels.len(),
        })
    }

    fn decoder(&self) -> Result<TileDecoder, TileError> {
        TileDecoder::new(self.descriptor.version, self.descriptor.format_tag)
    }

    /// Memoised record, or locate the tile and measure it.
    fn resolve_record(
        &self,
        lvl: &Level,
        tile_index: u64,
        col: u32,
        row: u32,
    ) -> Result<TileRecord, TileError> {
        if let Some(record) = lvl.record(tile_index) {
            return Ok(record);
        }

        let location = {
            let reader = LocalFileReader::open(lvl.path())?;
            locate(&reader, self.descriptor.version, lvl.layer(), tile_index)?
        };

        let cropped = lvl.cropped_tile_size(col, row);
        let (width, height) = if location.size == 0 {
            cropped
        } else {
            self.decoder()?.dimensions(lvl.path(), location, cropped)?
        };

        debug!(
            layer = lvl.layer(),
            col,
            row,
            offset = location.offset,
            size = location.size,
            width,
            height,
            "Located tile"
        );

        Ok(lvl.remember(
            tile_index,
            TileRecord {
                offset: location.offset,
                size: location.size,
                width,
                height,
            },
        ))
    }
}

fn out_of_bounds(level: usize, lvl: &Level, col: u32, row: u32) -> TileError {
    let (max_x, max_y) = lvl.tile_count();
    TileError::TileOutOfBounds {
        level,
        x: u64::from(col),
        y: u64::from(row),
        max_x: u64::from(max_x),
        max_y: u64::from(max_y),
    }
}

// =============================================================================
// Tests
// =============================================================================
