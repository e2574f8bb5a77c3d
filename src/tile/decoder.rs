//! Tile payload decoding.
//!
//! Each container declares one pixel format for all of its tiles:
//!
//! | Tag | Format    | Read strategy                         | Tile dimensions        |
//! |-----|-----------|---------------------------------------|------------------------|
//! | 0   | JPEG      | payload read into memory, then decode | from the JPEG header   |
//! | 1   | JPEG 2000 | payload read into memory, then decode | arithmetic, cropped    |
//! | 2   | PNG       | decoded straight from the level file  | arithmetic, cropped    |
//! | 3   | BMP       | decoded straight from the level file  | arithmetic, cropped    |
//!
//! JPEG edge tiles are often padded to the full grid size when encoded, or
//! smaller than it, so their true size is only known from the stream. Other
//! formats are always cropped exactly to the image edge.
//!
//! Version 1 containers are always JPEG, whatever the header says.

use std::io::{BufRead, Cursor, Seek};
use std::path::Path;

use image::{ImageFormat, ImageReader, Limits};
use serde::Serialize;
use tracing::debug;

use crate::error::TileError;
use crate::format::vsf::{TileLocation, Version};
use crate::io::{FileWindow, LocalFileReader, RangeReader};

use super::buffer::TileBuffer;

// =============================================================================
// PixelFormat
// =============================================================================

/// Compression format of tile payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PixelFormat {
    Jpeg = 0,
    Jpeg2000 = 1,
    Png = 2,
    Bmp = 3,
}

impl PixelFormat {
    /// Map a header format tag to a pixel format.
    pub fn from_tag(tag: u8) -> Result<Self, TileError> {
        match tag {
            0 => Ok(PixelFormat::Jpeg),
            1 => Ok(PixelFormat::Jpeg2000),
            2 => Ok(PixelFormat::Png),
            3 => Ok(PixelFormat::Bmp),
            other => Err(TileError::UnknownPixelFormat(other)),
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Get a human-readable name for the format.
    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Jpeg => "JPEG",
            PixelFormat::Jpeg2000 => "JPEG 2000",
            PixelFormat::Png => "PNG",
            PixelFormat::Bmp => "BMP",
        }
    }

    /// Whether the payload must be read into memory before decoding.
    pub const fn needs_prefetch(self) -> bool {
        matches!(self, PixelFormat::Jpeg | PixelFormat::Jpeg2000)
    }

    /// Whether tile dimensions come from the compressed stream.
    pub const fn dimensions_from_stream(self) -> bool {
        matches!(self, PixelFormat::Jpeg)
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// TileDecoder
// =============================================================================

/// Decodes tile payloads of one container into RGBA buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDecoder {
    format: PixelFormat,
}

impl TileDecoder {
    /// Create a decoder for a container's version and format tag.
    ///
    /// # Errors
    ///
    /// `UnknownPixelFormat` for a version 2 tag outside 0..=3.
    ///
    /// Version 1 headers carry no format tag; their tiles are complete JPEG
    /// streams and decode exactly like version 2 JPEG tiles.
    pub fn new(version: Version, format_tag: u8) -> Result<Self, TileError> {
        let format = if version.major == 1 {
            PixelFormat::Jpeg
        } else {
            PixelFormat::from_tag(format_tag)?
        };
        Ok(Self { format })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel size of a tile.
    ///
    /// # Arguments
    ///
    /// * `path` - Level data file
    /// * `location` - Payload byte range
    /// * `cropped` - Grid tile size clipped to the image edge
    ///
    /// # Returns
    ///
    /// The size declared by the JPEG stream for JPEG tiles, `cropped` otherwise.
    pub fn dimensions(
        &self,
        path: &Path,
        location: TileLocation,
        cropped: (u32, u32),
    ) -> Result<(u32, u32), TileError> {
        if !self.format.dimensions_from_stream() {
            return Ok(cropped);
        }

        let window = FileWindow::open(path, location.offset, location.size)?;
        ImageReader::with_format(window.buffered(), ImageFormat::Jpeg)
            .into_dimensions()
            .map_err(|e| TileError::DecodeError {
                message: format!("JPEG header at offset {}: {}", location.offset, e),
            })
    }

    /// Decode one tile payload.
    ///
    /// The decoded image must be exactly `width x height` pixels.
    pub fn decode(
        &self,
        path: &Path,
        location: TileLocation,
        width: u32,
        height: u32,
    ) -> Result<TileBuffer, TileError> {
        // Fails early on dimensions no buffer could hold
        TileBuffer::byte_len(width, height)?;

        debug!(
            path = %path.display(),
            offset = location.offset,
            size = location.size,
            format = self.format.name(),
            width,
            height,
            "Decoding tile"
        );

        match self.format {
            // Version 1 tiles take the same prefetch-then-decode route
            PixelFormat::Jpeg => {
                let payload = prefetch(path, location)?;
                decode_with(Cursor::new(payload), ImageFormat::Jpeg, width, height)
            }
            PixelFormat::Jpeg2000 => {
                let payload = prefetch(path, location)?;
                decode_jpeg2000(&payload, width, height)
            }
            PixelFormat::Png => {
                let window = FileWindow::open(path, location.offset, location.size)?;
                decode_with(window.buffered(), ImageFormat::Png, width, height)
            }
            PixelFormat::Bmp => {
                let window = FileWindow::open(path, location.offset, location.size)?;
                decode_with(window.buffered(), ImageFormat::Bmp, width, height)
            }
        }
    }
}

// =============================================================================
// Decoding helpers
// =============================================================================

/// Read a whole payload with a short-lived file handle.
fn prefetch(path: &Path, location: TileLocation) -> Result<bytes::Bytes, TileError> {
    let len = usize::try_from(location.size).map_err(|_| TileError::AllocationFailure {
        bytes: location.size,
    })?;
    let reader = LocalFileReader::open(path)?;
    Ok(reader.read_exact_at(location.offset, len)?)
}

/// Decode through the `image` crate, bounding the decoder to the expected size.
fn decode_with<R: BufRead + Seek>(
    reader: R,
    format: ImageFormat,
    width: u32,
    height: u32,
) -> Result<TileBuffer, TileError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(width);
    limits.max_image_height = Some(height);

    let mut reader = ImageReader::with_format(reader, format);
    reader.limits(limits);

    let img = reader.decode().map_err(|e| TileError::DecodeError {
        message: format!("{:?}: {}", format, e),
    })?;

    let rgba = img.into_rgba8();
    check_dimensions(rgba.dimensions(), width, height)?;
    TileBuffer::from_rgba(width, height, rgba.into_raw())
}

/// Decode a JPEG 2000 codestream (or JP2 file) held in memory.
///
/// Missing alpha is filled in as opaque, so the codec only ever hands back
/// RGBA or gray+alpha samples.
fn decode_jpeg2000(payload: &[u8], width: u32, height: u32) -> Result<TileBuffer, TileError> {
    let image = jpeg2k::Image::from_bytes(payload).map_err(jpeg2000_error)?;
    let data = image.get_pixels(Some(255)).map_err(jpeg2000_error)?;
    check_dimensions((data.width, data.height), width, height)?;

    let pixels = match data.format {
        jpeg2k::ImageFormat::Rgba8 => data.data,
        jpeg2k::ImageFormat::La8 => expand(&data.data, 2, |p| [p[0], p[0], p[0], p[1]]),
        jpeg2k::ImageFormat::Rgb8 => expand(&data.data, 3, |p| [p[0], p[1], p[2], 255]),
        jpeg2k::ImageFormat::L8 => expand(&data.data, 1, |p| [p[0], p[0], p[0], 255]),
    };

    TileBuffer::from_rgba(width, height, pixels)
}

fn jpeg2000_error(e: impl std::fmt::Display) -> TileError {
    TileError::DecodeError {
        message: format!("JPEG 2000: {}", e),
    }
}

/// Widen packed samples of `channels` bytes each to RGBA.
fn expand(samples: &[u8], channels: usize, to_rgba: impl Fn(&[u8]) -> [u8; 4]) -> Vec<u8> {
    samples
        .chunks_exact(channels)
        .flat_map(|p| to_rgba(p))
        .collect()
}

fn check_dimensions(actual: (u32, u32), width: u32, height: u32) -> Result<(), TileError> {
    if actual != (width, height) {
        return Err(TileError::DecodeError {
            message: format!(
                "decoded tile is {}x{}, expected {}x{}",
                actual.0, actual.1, width, height
            ),
        });
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
