//! DZ Block - Compressed Data Block
//!
//! The DZ block contains zlib-compressed data that represents another block type
//! (typically DT or SD). Decompression requires the `compression` feature.

use crate::{
    Error, Result,
    blocks::{
        common::{BlockHeader, BlockParse, u64_to_usize},
        cursor::BlockCursor,
    },
};

/// Compression algorithm used in DZ and HL blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ZipType {
    /// Deflate only (zlib).
    Deflate = 0,
    /// Transposition followed by deflate.
    TranspositionDeflate = 1,
}

impl ZipType {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Deflate),
            1 => Ok(Self::TranspositionDeflate),
            other => Err(Error::UnknownZipType(other)),
        }
    }
}

/// DZ Block - Zlib compressed data block.
///
/// The DZ block header (after the standard 24-byte block header):
/// - Offset 24-25: Original block type (2 bytes, e.g., "DT")
/// - Offset 26: Compression type (1 byte)
/// - Offset 27: Reserved (1 byte)
/// - Offset 28-31: Zip parameter (4 bytes, column count for transposition)
/// - Offset 32-39: Original data length (8 bytes)
/// - Offset 40-47: Compressed data length (8 bytes)
/// - Offset 48+: Compressed data
#[derive(Debug, Clone)]
pub struct DzBlock {
    pub header: BlockHeader,
    /// Original block type identifier (e.g., "DT", "SD").
    pub original_block_type: [u8; 2],
    pub zip_type: ZipType,
    /// For transposition: number of columns (the record length).
    pub zip_parameter: u32,
    /// Original uncompressed data size in bytes.
    pub original_data_length: u64,
    /// Compressed data size in bytes.
    pub compressed_data_length: u64,
    /// Compressed data bytes (zlib format).
    pub data: Vec<u8>,
}

impl BlockParse for DzBlock {
    const ID: &'static str = "##DZ";

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse_header(bytes)?;
        let mut cursor = BlockCursor::new(bytes)?;
        let header = cursor.header().clone();
        cursor.skip(header.link_count as usize * 8)?;

        let org = cursor.read_bytes(2)?;
        let original_block_type = [org[0], org[1]];
        let zip_type = ZipType::from_u8(cursor.read_u8()?)?;
        cursor.skip(1)?;
        let zip_parameter = cursor.read_u32()?;
        let original_data_length = cursor.read_u64()?;
        let compressed_data_length = cursor.read_u64()?;
        let data = cursor.read_bytes(compressed_data_length as usize)?.to_vec();

        Ok(Self {
            header,
            original_block_type,
            zip_type,
            zip_parameter,
            original_data_length,
            compressed_data_length,
            data,
        })
    }
}

impl DzBlock {
    /// Returns true when the compressed payload is signal data.
    pub fn holds_signal_data(&self) -> bool {
        &self.original_block_type == b"SD"
    }

    /// Decompress the block data.
    ///
    /// `zip_override` replaces the block's own zip type; header list blocks
    /// use it to impose one zip type on every block they reach.
    ///
    /// # Errors
    ///
    /// Returns an error if decompression fails or the decompressed size
    /// doesn't match the expected original size. Inflation stops once the
    /// declared original size is exceeded.
    #[cfg(feature = "compression")]
    pub fn decompress(&self, zip_override: Option<ZipType>) -> Result<Vec<u8>> {
        use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;

        let limit = u64_to_usize(self.original_data_length, "DZ original length")?;
        let decompressed = decompress_to_vec_zlib_with_limit(&self.data, limit)
            .map_err(|e| Error::DecompressionError(format!("{:?}", e.status)))?;

        if decompressed.len() as u64 != self.original_data_length {
            return Err(Error::DecompressionError(format!(
                "size mismatch: expected {}, got {}",
                self.original_data_length,
                decompressed.len()
            )));
        }

        match zip_override.unwrap_or(self.zip_type) {
            ZipType::Deflate => Ok(decompressed),
            ZipType::TranspositionDeflate => {
                Ok(inverse_transpose(&decompressed, self.zip_parameter as usize))
            }
        }
    }

    #[cfg(not(feature = "compression"))]
    pub fn decompress(&self, _zip_override: Option<ZipType>) -> Result<Vec<u8>> {
        Err(Error::CompressionUnavailable)
    }
}

/// Transpose the first `rows * cols` bytes of `data`, viewed as a row-major
/// `rows` x `cols` matrix. Bytes past that square are appended unchanged.
pub fn transpose(data: &[u8], rows: usize, cols: usize) -> Vec<u8> {
    let body = rows.saturating_mul(cols).min(data.len());
    let mut out = Vec::with_capacity(data.len());
    if rows.saturating_mul(cols) == body && body > 0 {
        for c in 0..cols {
            for r in 0..rows {
                out.push(data[r * cols + c]);
            }
        }
    } else {
        out.extend_from_slice(&data[..body]);
    }
    out.extend_from_slice(&data[body..]);
    out
}

/// Undo the byte transposition of a DZ payload.
///
/// The writer stored `zip_parameter` columns of `len / zip_parameter` bytes
/// each; reading them back as that matrix and transposing restores the
/// records.
pub fn inverse_transpose(data: &[u8], zip_parameter: usize) -> Vec<u8> {
    if zip_parameter == 0 {
        return data.to_vec();
    }
    let rows = data.len() / zip_parameter;
    transpose(data, zip_parameter, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Block header plus the DZ fields.
    const DZ_HEADER_SIZE: usize = 48;

    fn create_dz_header(
        original_type: &[u8; 2],
        zip_type: u8,
        zip_param: u32,
        original_len: u64,
        compressed_len: u64,
    ) -> Vec<u8> {
        let total_len = DZ_HEADER_SIZE as u64 + compressed_len;

        let mut bytes = Vec::with_capacity(DZ_HEADER_SIZE);

        // Block header (24 bytes)
        bytes.extend_from_slice(b"##DZ");
        bytes.extend_from_slice(&0u32.to_le_bytes()); // reserved
        bytes.extend_from_slice(&total_len.to_le_bytes()); // length
        bytes.extend_from_slice(&0u64.to_le_bytes()); // link_count

        // DZ-specific header (24 bytes)
        bytes.extend_from_slice(original_type); // original block type
        bytes.push(zip_type); // zip_type
        bytes.push(0); // reserved
        bytes.extend_from_slice(&zip_param.to_le_bytes()); // zip_parameter
        bytes.extend_from_slice(&original_len.to_le_bytes()); // original size
        bytes.extend_from_slice(&compressed_len.to_le_bytes()); // compressed size

        bytes
    }

    #[test]
    fn parse_dz_header() {
        let compressed_data = [0x78, 0x9c, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
        let mut bytes = create_dz_header(b"DT", 0, 0, 0, compressed_data.len() as u64);
        bytes.extend_from_slice(&compressed_data);

        let dz = DzBlock::from_bytes(&bytes).unwrap();
        assert_eq!(dz.original_block_type, *b"DT");
        assert_eq!(dz.zip_type, ZipType::Deflate);
        assert_eq!(dz.zip_parameter, 0);
        assert_eq!(dz.compressed_data_length, compressed_data.len() as u64);
        assert!(!dz.holds_signal_data());
    }

    #[test]
    fn invalid_compression_type() {
        let mut bytes = create_dz_header(b"DT", 99, 0, 0, 1);
        bytes.push(0);
        assert!(matches!(
            DzBlock::from_bytes(&bytes),
            Err(Error::UnknownZipType(99))
        ));
    }

    #[test]
    fn compressed_length_beyond_block_is_rejected() {
        let mut bytes = create_dz_header(b"DT", 0, 0, 0, 4);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        // claim more compressed bytes than the block holds
        bytes[40..48].copy_from_slice(&64u64.to_le_bytes());
        assert!(matches!(
            DzBlock::from_bytes(&bytes),
            Err(Error::BlockOverrun { .. })
        ));
    }

    #[test]
    fn transpose_keeps_tail() {
        // 2 records of 3 bytes stored column-major, plus one stray byte
        let columns = [1u8, 4, 2, 5, 3, 6, 99];
        assert_eq!(inverse_transpose(&columns, 3), vec![1, 2, 3, 4, 5, 6, 99]);
    }

    proptest! {
        #[test]
        fn transpose_is_an_involution(rows in 1usize..16, cols in 1usize..16, tail in 0usize..5, seed in any::<u8>()) {
            let data: Vec<u8> = (0..rows * cols + tail).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();
            let there = transpose(&data, rows, cols);
            let back = transpose(&there, cols, rows);
            prop_assert_eq!(back, data);
        }
    }

    #[cfg(feature = "compression")]
    mod compression_tests {
        use super::*;
        use miniz_oxide::deflate::compress_to_vec_zlib;

        #[test]
        fn decompress_deflate() {
            let original_data = b"Hello, MDF4 world! This is test data for compression.";
            let compressed = compress_to_vec_zlib(original_data, 6);

            let mut bytes = create_dz_header(
                b"DT",
                0,
                0,
                original_data.len() as u64,
                compressed.len() as u64,
            );
            bytes.extend_from_slice(&compressed);

            let dz = DzBlock::from_bytes(&bytes).unwrap();
            assert_eq!(dz.decompress(None).unwrap().as_slice(), original_data);
        }

        #[test]
        fn decompress_transposition() {
            let original_data: Vec<u8> = vec![
                1, 2, 3, 4, // row 0
                5, 6, 7, 8, // row 1
                9, 10, 11, 12, // row 2
            ];
            let transposed = transpose(&original_data, 3, 4);
            let compressed = compress_to_vec_zlib(&transposed, 6);

            let mut bytes = create_dz_header(
                b"DT",
                1,
                4,
                original_data.len() as u64,
                compressed.len() as u64,
            );
            bytes.extend_from_slice(&compressed);

            let dz = DzBlock::from_bytes(&bytes).unwrap();
            assert_eq!(dz.decompress(None).unwrap(), original_data);
            // a header list imposing plain deflate leaves the bytes transposed
            assert_eq!(dz.decompress(Some(ZipType::Deflate)).unwrap(), transposed);
        }

        #[test]
        fn decompress_size_mismatch() {
            let compressed = compress_to_vec_zlib(b"test", 6);
            let mut bytes = create_dz_header(b"DT", 0, 0, 100, compressed.len() as u64);
            bytes.extend_from_slice(&compressed);

            let dz = DzBlock::from_bytes(&bytes).unwrap();
            assert!(matches!(
                dz.decompress(None),
                Err(Error::DecompressionError(_))
            ));
        }

        #[test]
        fn inflation_stops_at_declared_size() {
            // 1 MiB of zeros compresses to about a kilobyte
            let compressed = compress_to_vec_zlib(&vec![0u8; 1 << 20], 9);
            let mut bytes = create_dz_header(b"DT", 0, 0, 16, compressed.len() as u64);
            bytes.extend_from_slice(&compressed);

            let dz = DzBlock::from_bytes(&bytes).unwrap();
            assert!(matches!(
                dz.decompress(None),
                Err(Error::DecompressionError(_))
            ));
        }

        #[test]
        fn corrupt_stream_fails() {
            let garbage = [0x12u8, 0x34, 0x56, 0x78];
            let mut bytes = create_dz_header(b"DT", 0, 0, 4, garbage.len() as u64);
            bytes.extend_from_slice(&garbage);
            let dz = DzBlock::from_bytes(&bytes).unwrap();
            assert!(dz.decompress(None).is_err());
        }
    }
}
