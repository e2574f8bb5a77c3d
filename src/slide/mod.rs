//! Slide layer.
//!
//! An open slide ties the container parsing in [`crate::format`] to the tile
//! machinery in [`crate::tile`]:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                VsfSlide                 │
//! │  descriptor · properties · levels       │
//! └──────┬──────────────────────┬───────────┘
//!        │                      │
//!        ▼                      ▼
//! ┌──────────────┐      ┌─────────────────┐
//! │    Level     │      │  CacheBinding   │
//! │ grid, plane, │      │ → TileCache     │
//! │ tile records │      │   (shareable)   │
//! └──────────────┘      └─────────────────┘
//! ```

mod properties;
mod reader;
mod vsf;

pub use properties::{
    Properties, PROPERTY_BACKGROUND_COLOR, PROPERTY_COMMENT, PROPERTY_FILENAME,
    PROPERTY_FOCAL_PLANE_RANGE, PROPERTY_LEVEL_COUNT, PROPERTY_MPP_X, PROPERTY_MPP_Y,
    PROPERTY_PIXEL_FORMAT, PROPERTY_QUALITY, PROPERTY_VERSION, PROPERTY_Z_RANGE,
};
pub use reader::{Level, LevelInfo, TileRecord};
pub use vsf::{TileHandle, VsfSlide};
