use crate::{
    Error, Result,
    blocks::{
        common::{BlockHeader, BlockParse},
        cursor::BlockCursor,
    },
};

/// DLBLOCK: Data List Block (ordered list of data blocks for signal/reduction)
#[derive(Debug, Clone)]
pub struct DataListBlock {
    pub header: BlockHeader,
    pub next: u64,            // link to next DLBLOCK
    pub data_links: Vec<u64>, // list of offsets to DT/RD/DZ/SDBLOCKs
    pub flags: u8,
    pub data_block_nr: u32,
    pub data_block_len: Option<u64>,
    pub offsets: Option<Vec<u64>>,
}

impl BlockParse for DataListBlock {
    const ID: &'static str = "##DL";

    /// Parse a DLBLOCK from raw bytes.
    ///
    /// Link 0 chains to the next DLBLOCK; every other link addresses a data
    /// fragment. With flag bit 0 set all fragments share one length,
    /// otherwise one offset per fragment follows.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse_header(bytes)?;
        let mut cursor = BlockCursor::new(bytes)?;
        let header = cursor.header().clone();
        if header.link_count == 0 {
            return Err(Error::InvalidLayout(
                "data list block without a next link".to_string(),
            ));
        }

        let links = cursor.read_links(header.link_count as usize)?;
        let next = links[0];
        let data_links = links[1..].to_vec();

        let flags = cursor.read_u8()?;
        cursor.skip(3)?;
        let data_block_nr = cursor.read_u32()?;

        let (data_block_len, offsets) = if flags & 1 != 0 {
            (Some(cursor.read_u64()?), None)
        } else {
            (None, Some(cursor.read_uint(8, data_block_nr as usize)?))
        };

        Ok(DataListBlock {
            header,
            next,
            data_links,
            flags,
            data_block_nr,
            data_block_len,
            offsets,
        })
    }
}

impl DataListBlock {
    /// Data fragments to visit, in order, with their position in the list.
    ///
    /// Links beyond `data_block_nr` are ignored; null links are skipped.
    pub fn fragments(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.data_links
            .iter()
            .take(self.data_block_nr as usize)
            .copied()
            .enumerate()
            .filter(|&(_, addr)| addr != 0)
    }

    /// True when every referenced data block has the same length.
    pub fn is_equal_length(&self) -> bool {
        self.flags & 1 != 0
    }

    /// Declared start of fragment `index` within the data of the list chain.
    ///
    /// `list_start` is where the data of this list begins; equal-length
    /// lists count from there, explicit offsets are absolute.
    pub fn fragment_offset(&self, index: usize, list_start: u64) -> Option<u64> {
        match (self.data_block_len, &self.offsets) {
            (Some(len), _) => Some(list_start + index as u64 * len),
            (None, Some(offsets)) => offsets.get(index).copied(),
            (None, None) => None,
        }
    }
}
