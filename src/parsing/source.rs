//! Byte sources addressed by explicit offsets.
//!
//! Every decoding routine receives a source together with the file offset it
//! should read from. No routine depends on a shared "current position", so a
//! data group can be decoded on its own handle without coordinating with
//! other groups.

use crate::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for reading byte ranges from different sources (files, memory, ...).
pub trait ByteSource {
    /// Read exactly `length` bytes starting at `offset`.
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Total size of the source in bytes.
    fn len(&self) -> u64;

    /// Returns true if the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open an independent handle on the same bytes.
    ///
    /// Workers decoding data groups concurrently each own one of these.
    fn reopen(&self) -> Result<Self>
    where
        Self: Sized;
}

fn check_range(offset: u64, length: u64, size: u64) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::TooShortBuffer {
            actual: size as usize,
            expected: offset.saturating_add(length) as usize,
            file: file!(),
            line: line!(),
        }),
    }
}

/// Local file reader implementation.
#[derive(Debug)]
pub struct FileRangeReader {
    file: File,
    path: PathBuf,
    size: u64,
}

impl FileRangeReader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, path, size })
    }

    /// Path the handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileRangeReader {
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        check_range(offset, length, self.size)?;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; length as usize];
        self.file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn reopen(&self) -> Result<Self> {
        Self::new(&self.path)
    }
}

/// An in-memory MDF image, cheap to share between workers.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteSource for MemorySource {
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        check_range(offset, length, self.bytes.len() as u64)?;
        let start = offset as usize;
        Ok(self.bytes[start..start + length as usize].to_vec())
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn reopen(&self) -> Result<Self> {
        Ok(self.clone())
    }
}
