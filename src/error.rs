use thiserror::Error;

/// I/O errors that can occur when reading index or level files.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File does not exist or cannot be opened
    #[error("File not found: {0}")]
    NotFound(String),

    /// Underlying read or seek failed
    #[error("Read error on {path}: {message}")]
    Read { path: String, message: String },

    /// Fewer bytes were available than requested
    #[error("Truncated read: requested {requested} bytes at offset {offset}, size is {size}")]
    TruncatedRead {
        offset: u64,
        requested: u64,
        size: u64,
    },
}

/// Errors raised while detecting or opening a VSF container.
///
/// Any of these aborts the open; a slide handle is never returned half-built.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the index file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Index path does not carry the `.vsf` extension
    #[error("Inappropriate index filename: {0}")]
    InvalidExtension(String),

    /// Header could be read but its content is unusable
    #[error("Malformed header: {reason}")]
    MalformedHeader { reason: String },

    /// Magic prefix does not encode a supported product version
    #[error("Unsupported product version in magic {magic:?}")]
    UnsupportedVersion { magic: String },

    /// A level or focal-plane data file required by the index is missing
    #[error("Missing image chunk file: {path}")]
    MissingFile { path: String },
}

/// Errors that abort a single tile request.
///
/// None of these invalidate the slide handle or other cached tiles.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// I/O error while locating or decoding the tile
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Container-level error surfaced during a tile request
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Requested pyramid level does not exist
    #[error("Invalid level {level}: slide has {max_levels} levels")]
    InvalidLevel { level: usize, max_levels: usize },

    /// Tile column/row outside the level grid
    #[error("Tile ({x}, {y}) out of bounds for level {level} (grid is {max_x}x{max_y})")]
    TileOutOfBounds {
        level: usize,
        x: u64,
        y: u64,
        max_x: u64,
        max_y: u64,
    },

    /// Linear tile index beyond the count declared by the data file
    #[error("Tile index is invalid - number of tiles in file: {count}, index requested: {index}")]
    InvalidTileIndex { index: u64, count: u64 },

    /// Tile directory content is inconsistent
    #[error("Corrupt tile directory: {message}")]
    CorruptDirectory { message: String },

    /// Pixel format tag not known
    #[error("Unknown tile data format: {0}")]
    UnknownPixelFormat(u8),

    /// Compressed payload could not be decoded
    #[error("Failed to decode tile: {message}")]
    DecodeError { message: String },

    /// Decoded pixels could not be re-encoded for export
    #[error("Failed to encode tile: {message}")]
    EncodeError { message: String },

    /// Pixel buffer for the tile could not be allocated
    #[error("Failed to allocate {bytes} bytes for tile buffer")]
    AllocationFailure { bytes: u64 },
}
