//! Tile location inside level data files.
//!
//! Given a linear tile index (`row * tiles_across + col`) this module finds the
//! byte offset and length of the tile's compressed payload. The two product
//! generations lay their tile directories out differently.
//!
//! # Version 1
//!
//! ```text
//! +grid      u32 tiles_x, u32 tiles_y
//! +grid+8    level 0 directory: tiles_x*tiles_y records, then a level trailer
//!            level 1 directory: ...
//! ```
//!
//! | minor | grid offset | record size | level trailer | offset field |
//! |-------|-------------|-------------|---------------|--------------|
//! | 0     | 25          | 12          | 16            | 4 bytes      |
//! | 1     | 29          | 16          | 16            | 8 bytes      |
//! | 2     | 41          | 16          | 28            | 8 bytes      |
//!
//! There is no per-level index: reaching level `L` means skipping `L` whole
//! directory blocks of `tiles_x*tiles_y*record_size + trailer` bytes. Each
//! record holds the offset field followed by a 4-byte size field; the size
//! reported for a tile is the offset shifted right by 32, and the stored size
//! field is read but unused.
//!
//! # Version 2
//!
//! ```text
//! Bytes 0-7:   unused
//! Bytes 8-15:  u64 tile_count
//! Bytes 16-..: tile_count u64 start offsets, ascending
//! ```
//!
//! A tile ends where the next one starts; the last tile ends at end of file.

use tracing::trace;

use crate::error::TileError;
use crate::io::{read_u32_le, read_u64_le, read_uint_le, RangeReader};

use super::header::Version;

// =============================================================================
// Constants
// =============================================================================

/// Offset of the tile count in a version 2 level file.
pub const V2_TILE_COUNT_OFFSET: u64 = 8;

/// Offset of the first tile start offset in a version 2 level file.
pub const V2_OFFSETS_START: u64 = 16;

/// Width of the size field following the offset in a version 1 record.
const V1_SIZE_FIELD_LEN: usize = 4;

// =============================================================================
// TileLocation
// =============================================================================

/// Byte range of one tile's compressed payload within a level file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    pub offset: u64,
    pub size: u64,
}

// =============================================================================
// Version 1 Directory Layout
// =============================================================================

/// Fixed record geometry of a version 1 tile directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V1DirectoryLayout {
    /// Offset of the `tiles_x`, `tiles_y` pair
    pub grid_offset: u64,
    /// Size of one tile record
    pub record_size: u64,
    /// Trailing bytes after each level's records
    pub level_trailer: u64,
    /// Width of the offset field at the start of each record
    pub offset_size: usize,
}

impl V1DirectoryLayout {
    /// Layout for a version 1 minor version, if supported.
    pub const fn for_minor(minor: u8) -> Option<Self> {
        match minor {
            0 => Some(Self {
                grid_offset: 25,
                record_size: 12,
                level_trailer: 16,
                offset_size: 4,
            }),
            1 => Some(Self {
                grid_offset: 29,
                record_size: 16,
                level_trailer: 16,
                offset_size: 8,
            }),
            2 => Some(Self {
                grid_offset: 41,
                record_size: 16,
                level_trailer: 28,
                offset_size: 8,
            }),
            _ => None,
        }
    }

    /// Absolute position of the record for `tile_index` on `layer`.
    ///
    /// `tile_count` is the `tiles_x * tiles_y` read from the grid header;
    /// every skipped level is assumed to share it.
    pub fn record_position(&self, tile_count: u64, layer: u8, tile_index: u64) -> Option<u64> {
        let level_block = tile_count
            .checked_mul(self.record_size)?
            .checked_add(self.level_trailer)?;

        (self.grid_offset + 8)
            .checked_add(level_block.checked_mul(u64::from(layer))?)?
            .checked_add(tile_index.checked_mul(self.record_size)?)
    }
}

// =============================================================================
// Locate
// =============================================================================

/// Locate a tile's payload in a level file of either generation.
pub fn locate<R: RangeReader>(
    reader: &R,
    version: Version,
    layer: u8,
    tile_index: u64,
) -> Result<TileLocation, TileError> {
    let location = match version.major {
        1 => locate_v1(reader, version.minor, layer, tile_index)?,
        _ => locate_v2(reader, tile_index)?,
    };

    trace!(
        file = reader.identifier(),
        layer,
        tile_index,
        offset = location.offset,
        size = location.size,
        "Located tile"
    );

    Ok(location)
}

/// Read the `(tiles_x, tiles_y)` grid of a version 1 level file.
pub fn v1_tile_grid<R: RangeReader>(reader: &R, minor: u8) -> Result<(u32, u32), TileError> {
    let layout = v1_layout(minor)?;
    let grid = reader.read_exact_at(layout.grid_offset, 8)?;
    Ok((read_u32_le(&grid[0..4]), read_u32_le(&grid[4..8])))
}

/// Version 1: walk past `layer` directory blocks and read one record.
pub fn locate_v1<R: RangeReader>(
    reader: &R,
    minor: u8,
    layer: u8,
    tile_index: u64,
) -> Result<TileLocation, TileError> {
    let layout = v1_layout(minor)?;
    let (tiles_x, tiles_y) = v1_tile_grid(reader, minor)?;

    let count = u64::from(tiles_x) * u64::from(tiles_y);
    if tile_index >= count {
        return Err(TileError::InvalidTileIndex {
            index: tile_index,
            count,
        });
    }

    let position = layout
        .record_position(count, layer, tile_index)
        .ok_or_else(|| TileError::CorruptDirectory {
            message: format!(
                "record position overflows for layer {} tile {}",
                layer, tile_index
            ),
        })?;

    let record = reader.read_exact_at(position, layout.offset_size + V1_SIZE_FIELD_LEN)?;
    let offset = read_uint_le(&record[..layout.offset_size]);

    // The stored size field is not used; size comes from the offset's high word
    let size = offset >> 32;

    Ok(TileLocation { offset, size })
}

/// Read the declared tile count of a version 2 level file.
pub fn v2_tile_count<R: RangeReader>(reader: &R) -> Result<u64, TileError> {
    let count = reader.read_exact_at(V2_TILE_COUNT_OFFSET, 8)?;
    Ok(read_u64_le(&count))
}

/// Version 2: read the start offset of the tile and of its successor.
pub fn locate_v2<R: RangeReader>(reader: &R, tile_index: u64) -> Result<TileLocation, TileError> {
    let count = v2_tile_count(reader)?;
    if tile_index >= count {
        return Err(TileError::InvalidTileIndex {
            index: tile_index,
            count,
        });
    }

    let entry = tile_index
        .checked_mul(8)
        .and_then(|rel| V2_OFFSETS_START.checked_add(rel))
        .ok_or_else(|| TileError::CorruptDirectory {
            message: format!("offset entry for tile {} overflows", tile_index),
        })?;

    let is_last = tile_index == count - 1;
    let (offset, next) = if is_last {
        let offset = read_u64_le(&reader.read_exact_at(entry, 8)?);
        (offset, reader.size())
    } else {
        let pair = reader.read_exact_at(entry, 16)?;
        (read_u64_le(&pair[0..8]), read_u64_le(&pair[8..16]))
    };

    let size = next
        .checked_sub(offset)
        .ok_or_else(|| TileError::CorruptDirectory {
            message: format!(
                "tile {} starts at {} but its end is {}",
                tile_index, offset, next
            ),
        })?;

    Ok(TileLocation { offset, size })
}

fn v1_layout(minor: u8) -> Result<V1DirectoryLayout, TileError> {
    V1DirectoryLayout::for_minor(minor).ok_or_else(|| TileError::CorruptDirectory {
        message: format!("unsupported version 1 minor {}", minor),
    })
}

// =============================================================================
// Tests
// =============================================================================
