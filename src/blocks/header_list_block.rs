//! HL Block - Header List Block
//!
//! An HL block fronts a chain of DL blocks whose fragments are DZ blocks and
//! imposes a single zip type on all of them.

use crate::{
    Result,
    blocks::{
        common::{BlockHeader, BlockParse},
        cursor::BlockCursor,
        dz_block::ZipType,
    },
};

#[derive(Debug, Clone)]
pub struct HeaderListBlock {
    pub header: BlockHeader,
    /// Address of the first DL block.
    pub first_dl: u64,
    pub flags: u16,
    pub zip_type: ZipType,
}

impl BlockParse for HeaderListBlock {
    const ID: &'static str = "##HL";

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse_header(bytes)?;
        let mut cursor = BlockCursor::new(bytes)?;
        let header = cursor.header().clone();
        let links = cursor.read_links(header.link_count as usize)?;
        let first_dl = links.first().copied().unwrap_or(0);
        let flags = cursor.read_u16()?;
        let zip_type = ZipType::from_u8(cursor.read_u8()?)?;
        cursor.skip(5)?;

        Ok(Self {
            header,
            first_dl,
            flags,
            zip_type,
        })
    }
}
