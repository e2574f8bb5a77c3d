//! Tile export encoder.
//!
//! Re-encodes a decoded RGBA tile so it can be written to disk.
//!
//! # Design Decisions
//!
//! - **Format by extension**: `.png` keeps the alpha channel, `.jpg`/`.jpeg`
//!   flattens it onto the slide background color.
//!
//! - **No resizing**: Tiles are exported at their decoded size, which for edge
//!   tiles may be smaller than the grid tile size.

use std::path::Path;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::TileError;

use super::buffer::TileBuffer;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// ExportFormat
// =============================================================================

/// Output format for an exported tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    /// Pick the format from an output file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, TileError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("png") => Ok(ExportFormat::Png),
            Some("jpg") | Some("jpeg") => Ok(ExportFormat::Jpeg),
            _ => Err(TileError::EncodeError {
                message: format!(
                    "cannot infer output format from {} (use .png, .jpg or .jpeg)",
                    path.display()
                ),
            }),
        }
    }
}

// =============================================================================
// TileEncoder
// =============================================================================

/// Encoder for exporting decoded tiles.
#[derive(Debug, Clone)]
pub struct TileEncoder {
    quality: u8,
    background: [u8; 3],
}

impl TileEncoder {
    /// Create an encoder with the given JPEG quality and a white background.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
            background: [255, 255, 255],
        }
    }

    /// Color that transparent pixels are flattened onto for JPEG output.
    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    /// Encode a tile.
    ///
    /// # Arguments
    ///
    /// * `tile` - Decoded RGBA tile
    /// * `format` - Output format
    ///
    /// # Returns
    ///
    /// The encoded image bytes.
    pub fn encode(&self, tile: &TileBuffer, format: ExportFormat) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        let result = match format {
            ExportFormat::Png => PngEncoder::new(&mut output).write_image(
                tile.pixels(),
                tile.width(),
                tile.height(),
                ExtendedColorType::Rgba8,
            ),
            ExportFormat::Jpeg => {
                let rgb = flatten(tile.pixels(), self.background);
                JpegEncoder::new_with_quality(&mut output, self.quality).write_image(
                    &rgb,
                    tile.width(),
                    tile.height(),
                    ExtendedColorType::Rgb8,
                )
            }
        };

        result.map_err(|e| TileError::EncodeError {
            message: e.to_string(),
        })?;

        Ok(Bytes::from(output))
    }
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

/// Alpha-blend RGBA pixels onto an opaque background.
fn flatten(rgba: &[u8], background: [u8; 3]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let alpha = u16::from(px[3]);
        for c in 0..3 {
            let fg = u16::from(px[c]) * alpha;
            let bg = u16::from(background[c]) * (255 - alpha);
            rgb.push(((fg + bg + 127) / 255) as u8);
        }
    }
    rgb
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
