//! Container detection.
//!
//! A path is accepted as a VSF container when all of the following hold:
//!
//! 1. The file name ends in `.vsf` (any case)
//! 2. The index header parses for a supported product version
//! 3. Every level data file the header implies can be opened, for every
//!    declared focal plane plus the in-focus plane 0
//!
//! [`check`] reports the first failing condition; [`detect`] folds it into a
//! boolean for callers probing many candidate formats.

use std::path::Path;

use tracing::debug;

use crate::error::FormatError;
use crate::io::is_openable;

use super::vsf::{level_file_path, read_index_file, IndexDescriptor};

/// Focal planes whose data files must exist for every level.
///
/// Version 1 containers have a single plane. Version 2 containers need the
/// declared inclusive range, and plane 0 even when the range excludes it.
pub fn required_focal_planes(descriptor: &IndexDescriptor) -> impl Iterator<Item = i32> {
    let declared = if descriptor.version.major == 1 {
        0..=0
    } else {
        descriptor.focal_planes()
    };
    let plane_zero = (!declared.contains(&0)).then_some(0);
    declared.chain(plane_zero)
}

/// Validate a candidate container and return its parsed descriptor.
///
/// # Returns
/// * `Ok(IndexDescriptor)` - Header parsed and all data files are present
/// * `Err(FormatError::InvalidExtension)` - Name does not end in `.vsf`
/// * `Err(FormatError::UnsupportedVersion)` - Magic is not recognised
/// * `Err(FormatError::MissingFile)` - A level or focal-plane file is absent
pub fn check(path: impl AsRef<Path>) -> Result<IndexDescriptor, FormatError> {
    let path = path.as_ref();
    let descriptor = read_index_file(path)?;

    for layer in 0..descriptor.level_count {
        for focal in required_focal_planes(&descriptor) {
            let level_path = level_file_path(path, descriptor.version, layer, focal)?;
            if !is_openable(&level_path) {
                return Err(FormatError::MissingFile {
                    path: level_path.display().to_string(),
                });
            }
        }
    }

    Ok(descriptor)
}

/// Whether `path` is a readable VSF container.
pub fn detect(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match check(path) {
        Ok(_) => true,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Not a VSF container");
            false
        }
    }
}
