use crate::{
    Error, Result,
    blocks::{
        common::{BlockHeader, BlockParse},
        cursor::BlockCursor,
    },
};

/// DTBLOCK / RDBLOCK: fixed-length records, back to back.
#[derive(Debug, Clone)]
pub struct DataBlock {
    pub header: BlockHeader,
    pub data: Vec<u8>,
}

impl DataBlock {
    /// Tags accepted for plain record data.
    pub const IDS: [&'static str; 2] = ["##DT", "##RD"];
}

impl BlockParse for DataBlock {
    const ID: &'static str = "##DT";

    /// Parse a DTBLOCK or RDBLOCK from the given byte slice.
    ///
    /// The slice must contain at least the number of bytes specified by the
    /// block length in the header.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = BlockCursor::new(bytes)?;
        let header = cursor.header().clone();
        if !Self::IDS.contains(&header.id.as_str()) {
            return Err(Error::BlockIDError {
                actual: header.id,
                expected: "##DT / ##RD".to_string(),
            });
        }
        cursor.skip(header.link_count as usize * 8)?;
        let data = cursor.read_rest().to_vec();
        Ok(Self { header, data })
    }
}

impl DataBlock {
    /// Iterate over raw records of fixed size.
    /// Trailing bytes that do not form a complete record are not yielded.
    ///
    /// # Arguments
    /// * `record_size` - Size in bytes of one record (including record ID)
    pub fn records(&self, record_size: usize) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(record_size.max(1))
    }

    /// Number of complete records stored in the block.
    pub fn record_count(&self, record_size: usize) -> usize {
        if record_size == 0 {
            0
        } else {
            self.data.len() / record_size
        }
    }
}
