use crate::{
    Error, Result,
    blocks::{
        common::{BlockHeader, BlockParse, read_u32},
        cursor::BlockCursor,
    },
};

/// SDBLOCK: Signal Data Block (variable-length signal values)
#[derive(Debug, Clone)]
pub struct SignalDataBlock {
    pub header: BlockHeader,
    /// The concatenated sequence of VLSD values:
    /// [u32 length][value bytes] ... repeated, back-to-back.
    pub data: Vec<u8>,
}

impl BlockParse for SignalDataBlock {
    const ID: &'static str = "##SD";

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse_header(bytes)?;
        let mut cursor = BlockCursor::new(bytes)?;
        let header = cursor.header().clone();
        cursor.skip(header.link_count as usize * 8)?;
        let data = cursor.read_rest().to_vec();
        Ok(SignalDataBlock { header, data })
    }
}

impl SignalDataBlock {
    /// Walk the `(u32 length, bytes)` pairs of the block.
    ///
    /// Each item is the offset of the length prefix within the block payload
    /// together with the value bytes.
    pub fn values(&self) -> impl Iterator<Item = Result<(u64, &[u8])>> {
        signal_values(&self.data)
    }
}

/// Walk `(u32 length, bytes)` pairs of an SD payload, which may also come
/// from a decompressed DZ block.
///
/// A value running past the end of the payload yields one error and ends
/// the walk.
pub fn signal_values(buf: &[u8]) -> impl Iterator<Item = Result<(u64, &[u8])>> {
    let mut pos = 0usize;
    core::iter::from_fn(move || {
        if pos + 4 > buf.len() {
            return None;
        }
        let len = read_u32(buf, pos) as usize;
        let start = pos + 4;
        let end = start + len;
        if end > buf.len() {
            pos = buf.len();
            return Some(Err(Error::TooShortBuffer {
                actual: buf.len(),
                expected: end,
                file: file!(),
                line: line!(),
            }));
        }
        let offset = pos as u64;
        pos = end;
        Some(Ok((offset, &buf[start..end])))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sd(values: &[&[u8]]) -> Vec<u8> {
        let mut payload = Vec::new();
        for v in values {
            payload.extend_from_slice(&(v.len() as u32).to_le_bytes());
            payload.extend_from_slice(v);
        }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"##SD");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(24 + payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&payload);
        bytes
    }

    #[test]
    fn iterates_length_prefixed_values() {
        let block = SignalDataBlock::from_bytes(&sd(&[b"ab", b"", b"xyz"])).unwrap();
        let values: Vec<(u64, &[u8])> = block.values().map(|v| v.unwrap()).collect();
        assert_eq!(
            values,
            vec![(0, &b"ab"[..]), (6, &b""[..]), (10, &b"xyz"[..])]
        );
    }

    #[test]
    fn truncated_value_is_an_error() {
        let mut bytes = sd(&[b"abcd"]);
        // shrink the block so the last value no longer fits
        let len = bytes.len() as u64 - 2;
        bytes[8..16].copy_from_slice(&len.to_le_bytes());
        let block = SignalDataBlock::from_bytes(&bytes).unwrap();
        let mut it = block.values();
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }
}
