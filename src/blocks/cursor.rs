//! Block loading and bounded field reading.
//!
//! [`load_header`] and [`load_block`] fetch blocks from a [`ByteSource`] at an
//! explicit offset. [`BlockCursor`] walks the fields of a loaded block and
//! refuses to read past the length declared in its header.

use crate::{
    Error, Result,
    blocks::common::{BLOCK_HEADER_SIZE, BlockHeader, u64_to_usize},
    parsing::ByteSource,
};

/// Read the 24-byte header of the block starting at `offset`.
pub fn load_header(source: &mut dyn ByteSource, offset: u64) -> Result<BlockHeader> {
    let bytes = source.read_range(offset, BLOCK_HEADER_SIZE as u64)?;
    let header = BlockHeader::from_bytes(&bytes)?;
    if header.length < BLOCK_HEADER_SIZE as u64 {
        return Err(Error::TooShortBuffer {
            actual: header.length as usize,
            expected: BLOCK_HEADER_SIZE,
            file: file!(),
            line: line!(),
        });
    }
    Ok(header)
}

/// Read a complete block (header included) starting at `offset`.
pub fn load_block(source: &mut dyn ByteSource, offset: u64) -> Result<(BlockHeader, Vec<u8>)> {
    let header = load_header(source, offset)?;
    let bytes = source.read_range(offset, header.length)?;
    Ok((header, bytes))
}

/// Sequential reader over the fields of one block.
#[derive(Debug, Clone)]
pub struct BlockCursor<'a> {
    header: BlockHeader,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BlockCursor<'a> {
    /// Parse the header of `bytes` and position the cursor on the first link.
    ///
    /// `bytes` must hold at least `header.length` bytes; anything past that
    /// length is ignored.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let header = BlockHeader::from_bytes(bytes)?;
        let length = u64_to_usize(header.length, "block length")?;
        if length < BLOCK_HEADER_SIZE || bytes.len() < length {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: length.max(BLOCK_HEADER_SIZE),
                file: file!(),
                line: line!(),
            });
        }
        Ok(Self {
            header,
            bytes: &bytes[..length],
            pos: BLOCK_HEADER_SIZE,
        })
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Bytes left before the declared block length is reached.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(Error::BlockOverrun {
                id: self.header.id.clone(),
                requested: count,
                remaining: self.remaining(),
            });
        }
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Read `count` 8-byte links.
    pub fn read_links(&mut self, count: usize) -> Result<Vec<u64>> {
        self.read_uint(8, count)
    }

    /// Read `count` little-endian unsigned integers of `width` bytes each.
    pub fn read_uint(&mut self, width: usize, count: usize) -> Result<Vec<u64>> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(Error::InvalidLayout(format!(
                "unsupported integer width {width} in {} block",
                self.header.id
            )));
        }
        let total = width.checked_mul(count).ok_or(Error::BlockOverrun {
            id: self.header.id.clone(),
            requested: usize::MAX,
            remaining: self.remaining(),
        })?;
        let raw = self.take(total)?;
        Ok(raw
            .chunks_exact(width)
            .map(|chunk| {
                chunk
                    .iter()
                    .rev()
                    .fold(0u64, |acc, &b| (acc << 8) | b as u64)
            })
            .collect())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.read_uint(8, 1)?[0])
    }

    /// Borrow the next `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    /// Read `count` bytes as ASCII/Latin-1 characters.
    pub fn read_chars(&mut self, count: usize) -> Result<String> {
        Ok(self.take(count)?.iter().map(|&b| b as char).collect())
    }

    /// Skip `count` reserved bytes.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Borrow everything up to the declared block length.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let bytes: &'a [u8] = self.bytes;
        let rest = &bytes[self.pos..];
        self.pos = bytes.len();
        rest
    }
}
