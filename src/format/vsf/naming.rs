//! Index and level file naming.
//!
//! Each pyramid level lives in its own data file next to the index file:
//!
//! ```text
//! slide.vsf              index file
//! slide-level0.img       version 1, level 0
//! slide-level03.img      version 2, level 3, focal plane 0
//! slide-level03-1.img    version 2, level 3, focal plane -1
//! slide-level03+12.img   version 2, level 3, focal plane 12
//! ```

use std::path::{Path, PathBuf};

use crate::error::FormatError;

use super::header::Version;

/// Extension of the index file (matched case-insensitively).
pub const INDEX_FILE_EXTENSION: &str = ".vsf";

/// Extension of every level data file.
pub const IMAGE_FILE_EXTENSION: &str = ".img";

/// Verify that `path` names an index file and return its base name
/// (the file name without the `.vsf` extension).
pub fn check_index_extension(path: &Path) -> Result<&str, FormatError> {
    let invalid = || FormatError::InvalidExtension(path.display().to_string());

    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let ext_len = INDEX_FILE_EXTENSION.len();
    if name.len() <= ext_len || !name.is_char_boundary(name.len() - ext_len) {
        return Err(invalid());
    }

    let (base, ext) = name.split_at(name.len() - ext_len);
    if !ext.eq_ignore_ascii_case(INDEX_FILE_EXTENSION) {
        return Err(invalid());
    }

    Ok(base)
}

/// Suffix appended to the base name for a level / focal plane.
///
/// Version 1 files use a bare decimal level and never carry a focal suffix.
/// Version 2 files use a two-digit level and, for non-zero focal planes, a
/// signed focal index of at least two characters including the sign.
pub fn level_file_suffix(version: Version, layer: u8, focal_plane: i32) -> String {
    if version.major == 1 {
        format!("-level{}{}", layer, IMAGE_FILE_EXTENSION)
    } else if focal_plane == 0 {
        format!("-level{:02}{}", layer, IMAGE_FILE_EXTENSION)
    } else {
        format!("-level{:02}{:+02}{}", layer, focal_plane, IMAGE_FILE_EXTENSION)
    }
}

/// Path of the data file holding `layer` at `focal_plane`.
pub fn level_file_path(
    index_path: &Path,
    version: Version,
    layer: u8,
    focal_plane: i32,
) -> Result<PathBuf, FormatError> {
    let base = check_index_extension(index_path)?;
    let name = format!("{}{}", base, level_file_suffix(version, layer, focal_plane));
    Ok(index_path.with_file_name(name))
}
