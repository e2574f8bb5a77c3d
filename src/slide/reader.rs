//! Pyramid level model.
//!
//! A VSF pyramid has `level_count` levels, each half the size of the previous
//! one: level `n` is the base image shifted right by `n`. Every level is a
//! regular grid of tiles addressed row-major:
//!
//! ```text
//! tile_index = row * tiles_across + col
//! ```
//!
//! Tile records (payload location plus pixel size) are filled in the first
//! time a tile is located and never change afterwards.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;

use crate::error::FormatError;
use crate::format::vsf::{IndexDescriptor, TileLocation};
use crate::tile::PlaneId;

// =============================================================================
// Level Information
// =============================================================================

/// Information about a single pyramid level.
///
/// A plain snapshot, detached from the slide it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelInfo {
    /// Width of this level in pixels
    pub width: u32,

    /// Height of this level in pixels
    pub height: u32,

    /// Width of each tile in pixels
    pub tile_width: u32,

    /// Height of each tile in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    /// Downsample factor relative to level 0
    pub downsample: f64,
}

// =============================================================================
// Tile Record
// =============================================================================

/// Where a tile's payload lives and how large it decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRecord {
    pub offset: u64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
}

impl TileRecord {
    pub fn location(&self) -> TileLocation {
        TileLocation {
            offset: self.offset,
            size: self.size,
        }
    }

    /// A tile with no payload renders as transparent.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

// =============================================================================
// Level
// =============================================================================

/// One pyramid level of an open slide.
#[derive(Debug)]
pub struct Level {
    layer: u8,
    plane: PlaneId,
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    tiles_across: u32,
    tiles_down: u32,
    downsample: f64,
    path: PathBuf,
    records: Vec<OnceLock<TileRecord>>,
}

impl Level {
    /// Build level `layer` of the pyramid described by `descriptor`.
    ///
    /// # Arguments
    ///
    /// * `layer` - Layer number in the container (0 = full resolution)
    /// * `descriptor` - Parsed index header
    /// * `path` - Data file holding this layer's tiles
    pub fn new(layer: u8, descriptor: &IndexDescriptor, path: PathBuf) -> Result<Self, FormatError> {
        if descriptor.tile_width == 0 || descriptor.tile_height == 0 {
            return Err(FormatError::MalformedHeader {
                reason: "tile size is zero".to_string(),
            });
        }

        let shift = u32::from(layer);
        let width = descriptor.width.checked_shr(shift).unwrap_or(0);
        let height = descriptor.height.checked_shr(shift).unwrap_or(0);

        let tiles_across = width.div_ceil(descriptor.tile_width);
        let tiles_down = height.div_ceil(descriptor.tile_height);

        let count = usize::try_from(u64::from(tiles_across) * u64::from(tiles_down))
            .map_err(|_| grid_too_large(layer, tiles_across, tiles_down))?;
        let mut records = Vec::new();
        records
            .try_reserve_exact(count)
            .map_err(|_| grid_too_large(layer, tiles_across, tiles_down))?;
        records.resize_with(count, OnceLock::new);

        Ok(Self {
            layer,
            plane: PlaneId::next(),
            width,
            height,
            tile_width: descriptor.tile_width,
            tile_height: descriptor.tile_height,
            tiles_across,
            tiles_down,
            downsample: 2f64.powi(i32::from(layer)),
            path,
            records,
        })
    }

    /// Layer number inside the container files.
    pub fn layer(&self) -> u8 {
        self.layer
    }

    /// Cache plane identity of this level.
    pub fn plane(&self) -> PlaneId {
        self.plane
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn tile_count(&self) -> (u32, u32) {
        (self.tiles_across, self.tiles_down)
    }

    pub fn downsample(&self) -> f64 {
        self.downsample
    }

    /// Data file holding this level's tiles.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> LevelInfo {
        LevelInfo {
            width: self.width,
            height: self.height,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            tiles_x: self.tiles_across,
            tiles_y: self.tiles_down,
            downsample: self.downsample,
        }
    }

    /// Linear tile index for (col, row), if inside the grid.
    pub fn tile_index(&self, col: u32, row: u32) -> Option<u64> {
        if col >= self.tiles_across || row >= self.tiles_down {
            return None;
        }
        Some(u64::from(row) * u64::from(self.tiles_across) + u64::from(col))
    }

    /// Grid tile size clipped to the level edge.
    pub fn cropped_tile_size(&self, col: u32, row: u32) -> (u32, u32) {
        let clip = |extent: u32, tile: u32, index: u32| {
            let start = u64::from(tile) * u64::from(index);
            let remaining = u64::from(extent).saturating_sub(start);
            remaining.min(u64::from(tile)) as u32
        };
        (
            clip(self.width, self.tile_width, col),
            clip(self.height, self.tile_height, row),
        )
    }

    /// Record for a tile that was already located.
    pub fn record(&self, tile_index: u64) -> Option<TileRecord> {
        self.slot(tile_index)?.get().copied()
    }

    /// Store a tile's record, keeping the first one if another thread won.
    pub fn remember(&self, tile_index: u64, record: TileRecord) -> TileRecord {
        match self.slot(tile_index) {
            Some(slot) => *slot.get_or_init(|| record),
            None => record,
        }
    }

    fn slot(&self, tile_index: u64) -> Option<&OnceLock<TileRecord>> {
        usize::try_from(tile_index)
            .ok()
            .and_then(|i| self.records.get(i))
    }
}

fn grid_too_large(layer: u8, across: u32, down: u32) -> FormatError {
    FormatError::MalformedHeader {
        reason: format!("level {} tile grid {}x{} is too large", layer, across, down),
    }
}

// =============================================================================
// Tests
// =============================================================================
