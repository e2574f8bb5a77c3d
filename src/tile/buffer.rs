//! Decoded tile pixels.

use crate::error::TileError;

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: u64 = 4;

/// A decoded tile: `width * height` RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TileBuffer {
    /// Allocate a fully transparent buffer.
    ///
    /// Allocation is fallible: dimensions whose byte count overflows or cannot
    /// be reserved return `AllocationFailure` rather than aborting.
    pub fn transparent(width: u32, height: u32) -> Result<Self, TileError> {
        let bytes = Self::byte_len(width, height)?;
        let mut pixels = try_alloc(bytes)?;
        pixels.resize(bytes as usize, 0);
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Wrap decoded RGBA pixels, checking that the length matches the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, TileError> {
        let expected = Self::byte_len(width, height)?;
        if pixels.len() as u64 != expected {
            return Err(TileError::DecodeError {
                message: format!(
                    "pixel buffer is {} bytes, expected {} for {}x{}",
                    pixels.len(),
                    expected,
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Byte length of a `width x height` RGBA buffer.
    pub fn byte_len(width: u32, height: u32) -> Result<u64, TileError> {
        u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|p| p.checked_mul(BYTES_PER_PIXEL))
            .filter(|&b| usize::try_from(b).is_ok())
            .ok_or(TileError::AllocationFailure { bytes: u64::MAX })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Size in bytes, as charged against a cache's capacity.
    pub fn size_bytes(&self) -> u64 {
        self.pixels.len() as u64
    }

    /// RGBA value at (x, y), if inside the tile.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[at..at + 4]);
        Some(rgba)
    }

    /// Consume the buffer and return its pixels.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Reserve exactly `bytes` without aborting on failure.
pub(crate) fn try_alloc(bytes: u64) -> Result<Vec<u8>, TileError> {
    let len = usize::try_from(bytes).map_err(|_| TileError::AllocationFailure { bytes })?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| TileError::AllocationFailure { bytes })?;
    Ok(buf)
}
