//! # VSF Slide
//!
//! Cached tile access for pyramidal whole slide images stored in the VSF
//! container: a small `.vsf` index file plus one data file per pyramid level
//! and focal plane.
//!
//! ## Features
//!
//! - **Both format generations**: Version 1 and version 2 index and tile
//!   directory layouts, byte-exact
//! - **Shared tile cache**: A byte-budgeted, thread-safe LRU of decoded tiles
//!   that several open slides can share
//! - **Codecs**: JPEG, JPEG 2000, PNG and BMP tile payloads decoded to RGBA
//!
//! ## Architecture
//!
//! - [`io`] - Ranged reads from local files
//! - [`mod@format`] - Index header parsing, file naming, tile location, detection
//! - [`tile`] - Tile cache, cache binding, decoding and export encoding
//! - [`slide`] - Open slide handle tying levels, properties and cache together
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use vsf_slide::{TileCache, VsfSlide};
//!
//! // Two slides reading through one 64MB cache
//! let cache = TileCache::shared(64 * 1024 * 1024);
//! let a = VsfSlide::open_with_cache("a.vsf", cache.clone())?;
//! let b = VsfSlide::open_with_cache("b.vsf", cache)?;
//!
//! let tile = a.read_tile(0, 0, 0)?;
//! println!("{}x{} RGBA", tile.width(), tile.height());
//! # drop(b);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command};
pub use error::{FormatError, IoError, TileError};
pub use format::vsf::{IndexDescriptor, TileLocation, Version};
pub use format::{check, detect};
pub use io::{LocalFileReader, RangeReader};
pub use slide::{LevelInfo, Properties, TileHandle, TileRecord, VsfSlide};
pub use tile::{
    CacheBinding, CacheEntry, CacheKey, PixelFormat, PlaneId, TileBuffer, TileCache, TileDecoder,
    DEFAULT_CACHE_CAPACITY,
};
