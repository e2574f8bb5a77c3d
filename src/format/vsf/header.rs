//! VSF index file parsing.
//!
//! The index file (`*.vsf`) is a small binary header describing the whole
//! pyramid. Two product generations exist and both must stay readable.
//!
//! # Version Detection
//!
//! The first 6 bytes are an ASCII magic of the form `VSF<major>.<minor>`:
//!
//! ```text
//! byte[1] == '1'                       → major 1, minor = byte[3] ('0'..='2')
//! byte[3] >= '2' && byte[5] is a digit → major 2, minor = byte[5]
//! ```
//!
//! # Version 1 Layout
//!
//! Only four fields exist, at a minor-dependent offset (9, 13 or 25):
//!
//! ```text
//! +0  i32 image width
//! +4  i32 image height
//! +8  i32 tile width
//! +12 i32 tile height
//! ```
//!
//! # Version 2 Layout (little-endian, packed)
//!
//! ```text
//! Bytes  0-29: header text (NUL padded)
//! Byte     30: level count
//! Bytes 31-33: background R, G, B
//! Bytes 34-37: image width        Bytes 38-41: image height
//! Bytes 42-45: X resolution (DPI) Bytes 46-49: Y resolution (DPI)
//! Byte     50: pixel format tag   Byte     51: quality
//! Bytes 52-55: tile width         Bytes 56-59: tile height
//! ---- minor >= 1 only ----
//! Bytes 60-63: lowest focal plane Bytes 64-67: highest focal plane
//! Bytes 68-71: z range (f32, micrometres)
//! ```
//!
//! Fields a generation does not carry keep the defaults applied before parsing.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::FormatError;
use crate::io::{read_f32_le, read_i32_le, LocalFileReader, RangeReader};

use super::naming::check_index_extension;

// =============================================================================
// Constants
// =============================================================================

/// Length of the version magic at offset 0.
pub const MAGIC_LEN: usize = 6;

/// Length of the version 2 header for minor version 0.
pub const V2_HEADER_LEN_MINOR0: usize = 60;

/// Length of the version 2 header for minor version 1 and later.
pub const V2_HEADER_LEN: usize = 72;

/// Length of the NUL padded header text in version 2 files.
const V2_TEXT_LEN: usize = 30;

/// Level count assumed when the header does not carry one.
pub const DEFAULT_LEVEL_COUNT: u8 = 9;

/// Pixel format tag assumed when the header does not carry one (JPEG).
pub const DEFAULT_FORMAT_TAG: u8 = 0;

/// Largest focal plane magnitude a level file name can carry (`+99`/`-99`).
pub const MAX_FOCAL_PLANE: i32 = 99;

// =============================================================================
// Version
// =============================================================================

/// Product format version decoded from the magic prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    /// Decode the version from the 6-byte magic prefix.
    pub fn from_magic(magic: &[u8]) -> Result<Self, FormatError> {
        let unsupported = || FormatError::UnsupportedVersion {
            magic: String::from_utf8_lossy(magic).into_owned(),
        };

        if magic.len() < MAGIC_LEN {
            return Err(unsupported());
        }

        if magic[1] == b'1' {
            return match magic[3] {
                b'0'..=b'2' => Ok(Version {
                    major: 1,
                    minor: magic[3] - b'0',
                }),
                _ => Err(unsupported()),
            };
        }

        if magic[3] >= b'2' && magic[5].is_ascii_digit() {
            return Ok(Version {
                major: 2,
                minor: magic[5] - b'0',
            });
        }

        Err(unsupported())
    }

    /// Byte offset of the four dimension fields in a version 1 index file.
    fn v1_content_offset(&self) -> Option<u64> {
        match self.minor {
            0 => Some(9),
            1 => Some(13),
            2 => Some(25),
            _ => None,
        }
    }

    /// Size of the fixed version 2 header record.
    fn v2_header_len(&self) -> usize {
        if self.minor == 0 {
            V2_HEADER_LEN_MINOR0
        } else {
            V2_HEADER_LEN
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// =============================================================================
// IndexDescriptor
// =============================================================================

/// Normalized, version-independent view of a VSF index file.
///
/// Created once when a container is opened and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDescriptor {
    /// Product format version
    pub version: Version,

    /// Header text (the magic for version 1, the 30-byte text for version 2)
    pub header_text: String,

    /// Number of pyramid levels
    pub level_count: u8,

    /// Full-resolution image width in pixels
    pub width: u32,

    /// Full-resolution image height in pixels
    pub height: u32,

    /// Nominal tile width in pixels
    pub tile_width: u32,

    /// Nominal tile height in pixels
    pub tile_height: u32,

    /// Horizontal resolution in DPI (0 when unknown)
    pub resolution_x: i32,

    /// Vertical resolution in DPI (0 when unknown)
    pub resolution_y: i32,

    /// Background color as RGB
    pub background: [u8; 3],

    /// Lowest focal plane index
    pub lowest_focal_plane: i32,

    /// Highest focal plane index
    pub highest_focal_plane: i32,

    /// Distance between lowest and highest focal plane in micrometres
    pub z_range: f32,

    /// Raw pixel format tag (see [`crate::tile::PixelFormat`])
    pub format_tag: u8,

    /// Compression quality recorded by the scanner
    pub quality: u8,
}

impl IndexDescriptor {
    /// Descriptor with every field at its pre-overlay default.
    ///
    /// Older minor versions physically lack most header fields, so these
    /// values are what such files report.
    pub fn with_defaults(version: Version, header_text: String) -> Self {
        Self {
            version,
            header_text,
            level_count: DEFAULT_LEVEL_COUNT,
            width: 0,
            height: 0,
            tile_width: 0,
            tile_height: 0,
            resolution_x: 0,
            resolution_y: 0,
            background: [255, 255, 255],
            lowest_focal_plane: 0,
            highest_focal_plane: 0,
            z_range: 0.0,
            format_tag: DEFAULT_FORMAT_TAG,
            quality: 0,
        }
    }

    /// Parse an index file through a range reader.
    pub fn parse<R: RangeReader>(reader: &R) -> Result<Self, FormatError> {
        let magic = reader.read_exact_at(0, MAGIC_LEN)?;
        let version = Version::from_magic(&magic)?;

        let descriptor = match version.major {
            1 => Self::parse_v1(reader, version, &magic)?,
            _ => Self::parse_v2(reader, version)?,
        };

        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Version 1: four i32 fields at a minor-dependent offset, nothing else.
    fn parse_v1<R: RangeReader>(
        reader: &R,
        version: Version,
        magic: &[u8],
    ) -> Result<Self, FormatError> {
        let offset = version
            .v1_content_offset()
            .ok_or_else(|| FormatError::UnsupportedVersion {
                magic: String::from_utf8_lossy(magic).into_owned(),
            })?;

        let mut descriptor =
            Self::with_defaults(version, String::from_utf8_lossy(magic).into_owned());

        let fields = reader.read_exact_at(offset, 16)?;
        descriptor.width = non_negative("image width", read_i32_le(&fields[0..4]))?;
        descriptor.height = non_negative("image height", read_i32_le(&fields[4..8]))?;
        descriptor.tile_width = non_negative("tile width", read_i32_le(&fields[8..12]))?;
        descriptor.tile_height = non_negative("tile height", read_i32_le(&fields[12..16]))?;

        Ok(descriptor)
    }

    /// Version 2: one fixed record from offset 0 (60 or 72 bytes).
    fn parse_v2<R: RangeReader>(reader: &R, version: Version) -> Result<Self, FormatError> {
        let len = version.v2_header_len();
        let bytes = reader.read_exact_at(0, len)?;

        let mut descriptor = Self::with_defaults(version, header_text(&bytes[..V2_TEXT_LEN]));

        descriptor.level_count = bytes[30];
        descriptor.background = [bytes[31], bytes[32], bytes[33]];
        descriptor.width = non_negative("image width", read_i32_le(&bytes[34..38]))?;
        descriptor.height = non_negative("image height", read_i32_le(&bytes[38..42]))?;
        descriptor.resolution_x = read_i32_le(&bytes[42..46]);
        descriptor.resolution_y = read_i32_le(&bytes[46..50]);
        descriptor.format_tag = bytes[50];
        descriptor.quality = bytes[51];
        descriptor.tile_width = non_negative("tile width", read_i32_le(&bytes[52..56]))?;
        descriptor.tile_height = non_negative("tile height", read_i32_le(&bytes[56..60]))?;

        if len == V2_HEADER_LEN {
            descriptor.lowest_focal_plane = read_i32_le(&bytes[60..64]);
            descriptor.highest_focal_plane = read_i32_le(&bytes[64..68]);
            descriptor.z_range = read_f32_le(&bytes[68..72]);
        }

        Ok(descriptor)
    }

    /// Reject descriptors no pyramid can be built from.
    fn validate(&self) -> Result<(), FormatError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(FormatError::MalformedHeader {
                reason: format!(
                    "tile size must be non-zero, got {}x{}",
                    self.tile_width, self.tile_height
                ),
            });
        }
        if self.level_count == 0 {
            return Err(FormatError::MalformedHeader {
                reason: "level count is zero".to_string(),
            });
        }
        let (lowest, highest) = (self.lowest_focal_plane, self.highest_focal_plane);
        if lowest > highest || lowest < -MAX_FOCAL_PLANE || highest > MAX_FOCAL_PLANE {
            return Err(FormatError::MalformedHeader {
                reason: format!(
                    "focal plane range {}..{} is not within -{max}..{max}",
                    lowest,
                    highest,
                    max = MAX_FOCAL_PLANE
                ),
            });
        }
        Ok(())
    }

    /// Microns per pixel derived from a DPI resolution, if known.
    pub fn microns_per_pixel(resolution: i32) -> Option<f64> {
        if resolution > 0 {
            Some(25400.0 / f64::from(resolution))
        } else {
            None
        }
    }

    /// Focal planes declared by the header, inclusive on both ends.
    pub fn focal_planes(&self) -> std::ops::RangeInclusive<i32> {
        self.lowest_focal_plane..=self.highest_focal_plane
    }
}

/// Read and parse the index file at `path`.
///
/// The path must carry the `.vsf` extension (case-insensitive).
pub fn read_index_file(path: impl AsRef<Path>) -> Result<IndexDescriptor, FormatError> {
    let path = path.as_ref();
    check_index_extension(path)?;

    let reader = LocalFileReader::open(path)?;
    IndexDescriptor::parse(&reader)
}

fn non_negative(field: &str, value: i32) -> Result<u32, FormatError> {
    u32::try_from(value).map_err(|_| FormatError::MalformedHeader {
        reason: format!("{} is negative ({})", field, value),
    })
}

fn header_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

// =============================================================================
// Tests
// =============================================================================
