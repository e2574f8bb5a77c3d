//! Tile layer: decoding, caching and export of individual tiles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          VsfSlide (per request)         │
//! └───────┬─────────────────────┬───────────┘
//!         │ hit                 │ miss
//!         ▼                     ▼
//! ┌───────────────┐     ┌──────────────────┐
//! │ CacheBinding  │     │   TileDecoder    │
//! │      │        │     │ JPEG / J2K /     │
//! │      ▼        │◄────│ PNG / BMP → RGBA │
//! │  TileCache    │ put └──────────────────┘
//! └───────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCache`]: Byte-budgeted LRU of decoded tiles, shareable across slides
//! - [`CacheKey`]: Plane identity plus tile coordinates
//! - [`CacheEntry`]: Reference-counted handle to a decoded buffer
//! - [`CacheBinding`]: Swappable link from a slide to its cache
//! - [`TileDecoder`]: Dispatches a payload to the codec for its [`PixelFormat`]
//! - [`TileBuffer`]: RGBA8 pixels of one tile
//! - [`TileEncoder`]: Re-encodes a tile as PNG or JPEG for export

mod binding;
mod buffer;
mod cache;
mod decoder;
mod encoder;

pub use binding::CacheBinding;
pub use buffer::{TileBuffer, BYTES_PER_PIXEL};
pub use cache::{CacheEntry, CacheKey, PlaneId, TileCache, DEFAULT_CACHE_CAPACITY};
pub use decoder::{PixelFormat, TileDecoder};
pub use encoder::{
    clamp_quality, is_valid_quality, ExportFormat, TileEncoder, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
