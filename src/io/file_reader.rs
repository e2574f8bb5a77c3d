use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use parking_lot::Mutex;

use super::RangeReader;
use crate::error::IoError;

/// Local-file implementation of RangeReader.
///
/// The file is opened on creation and closed when the reader is dropped.
/// Callers create one reader per locate or decode operation; handles are
/// never pooled across requests.
pub struct LocalFileReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open `path` for ranged reads.
    ///
    /// The file size is captured once here and used for bounds checks.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let file = File::open(path).map_err(|e| map_open_error(&identifier, e))?;
        let size = file
            .metadata()
            .map_err(|e| IoError::Read {
                path: identifier.clone(),
                message: e.to_string(),
            })?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier,
        })
    }
}

impl RangeReader for LocalFileReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        // Validate range bounds
        let in_bounds = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            return Err(IoError::TruncatedRead {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| match e.kind() {
                // File shrank underneath us
                io::ErrorKind::UnexpectedEof => IoError::TruncatedRead {
                    offset,
                    requested: len as u64,
                    size: self.size,
                },
                _ => IoError::Read {
                    path: self.identifier.clone(),
                    message: e.to_string(),
                },
            })?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Check whether `path` can be opened for reading.
pub fn is_openable(path: impl AsRef<Path>) -> bool {
    File::open(path).is_ok()
}

pub(crate) fn map_open_error(identifier: &str, err: io::Error) -> IoError {
    match err.kind() {
        io::ErrorKind::NotFound => IoError::NotFound(identifier.to_string()),
        _ => IoError::Read {
            path: identifier.to_string(),
            message: err.to_string(),
        },
    }
}
