use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::file_reader::map_open_error;
use crate::error::IoError;

/// A `Read + Seek` view of `[start, start + len)` inside a file.
///
/// Decoders that take a filename and byte offset (PNG, BMP) read through a
/// window instead of prefetching the payload. Positions are relative to the
/// window, so decoders that seek from the start of their stream behave as
/// if the payload were a standalone file.
pub struct FileWindow {
    file: File,
    start: u64,
    len: u64,
    pos: u64,
}

impl FileWindow {
    /// Open `path` and position a window of `len` bytes at `start`.
    pub fn open(path: impl AsRef<Path>, start: u64, len: u64) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let mut file = File::open(path).map_err(|e| map_open_error(&identifier, e))?;

        let size = file
            .metadata()
            .map_err(|e| IoError::Read {
                path: identifier.clone(),
                message: e.to_string(),
            })?
            .len();
        if start.checked_add(len).map_or(true, |end| end > size) {
            return Err(IoError::TruncatedRead {
                offset: start,
                requested: len,
                size,
            });
        }

        file.seek(SeekFrom::Start(start)).map_err(|e| IoError::Read {
            path: identifier,
            message: e.to_string(),
        })?;

        Ok(Self {
            file,
            start,
            len,
            pos: 0,
        })
    }

    /// Wrap in a `BufReader`, as image decoders expect `BufRead`.
    pub fn buffered(self) -> BufReader<Self> {
        BufReader::new(self)
    }

    /// Length of the window in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for FileWindow {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(remaining as usize);
        let n = self.file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for FileWindow {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of window")
        })?;

        self.file.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(target)
    }
}
