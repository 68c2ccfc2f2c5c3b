//! Raw data block decoding and block-list resolution.
//!
//! A data pointer leads to a tree of blocks: `##HL` fronts a `##DL` chain,
//! `##DL` lists leaves, and leaves are plain (`##DT`/`##RD`), signal data
//! (`##SD`) or compressed (`##DZ`). [`RawBlock::decode`] walks that tree in
//! link order and feeds the payload of every leaf into a [`RecordSink`].

use super::{
    decoder::RecordBuffer,
    raw_channel_group::Projection,
    source::ByteSource,
};
use crate::{
    Error, Result,
    blocks::{
        BLOCK_HEADER_SIZE, BlockHeader, BlockParse, DataBlock, DataListBlock, DzBlock,
        HeaderListBlock, SignalDataBlock, ZipType, load_block, load_header, signal_values,
    },
};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// What the leaves of a block tree hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content {
    /// Fixed-length records (`##DT`, `##RD`).
    Records,
    /// `u32 length + bytes` values (`##SD`).
    SignalData,
}

impl Content {
    fn expected_tag(self) -> &'static str {
        match self {
            Content::Records => "##DT / ##RD",
            Content::SignalData => "##SD",
        }
    }
}

/// Receives the decoded payload of a block tree, in link order.
///
/// Block boundaries carry no meaning: a record may start in one block and
/// end in the next.
pub trait RecordSink {
    fn consume(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read size for uncompressed leaves. `None` reads each leaf at once.
    fn chunk_size(&self) -> Option<usize> {
        None
    }
}

impl RecordSink for RecordBuffer {
    fn consume(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Concatenated signal data of one VLSD channel.
///
/// Record offsets address the length prefix of a value within this stream,
/// counted across every SD block of a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalStream {
    data: Vec<u8>,
}

impl SignalStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value with its length prefix.
    pub fn push_value(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.data.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `(offset, value)` pairs in stream order.
    pub fn values(&self) -> impl Iterator<Item = Result<(u64, &[u8])>> {
        signal_values(&self.data)
    }

    /// Index every value by its offset.
    pub fn index(&self) -> Result<HashMap<u64, &[u8]>> {
        self.values().collect()
    }
}

impl RecordSink for SignalStream {
    fn consume(&mut self, bytes: &[u8]) -> Result<()> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }
}

/// Keeps only the projected fields of each record, reading plain blocks in
/// chunks instead of whole.
#[derive(Debug)]
pub struct ProjectingSink {
    projection: Projection,
    out: Vec<u8>,
    chunk_size: usize,
}

impl ProjectingSink {
    pub fn new(projection: Projection, chunk_size: usize) -> Self {
        Self {
            projection,
            out: Vec::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Compact records of `record_length` bytes each.
    ///
    /// A projection that keeps no bytes still yields one row per complete
    /// source record.
    pub fn into_records(self, record_length: usize) -> RecordBuffer {
        if self.projection.pending() > 0 {
            debug!(
                "Dropping {} bytes of an incomplete trailing record",
                self.projection.pending()
            );
        }
        if record_length == 0 {
            return RecordBuffer::empty_rows(self.projection.records());
        }
        RecordBuffer::with_data(record_length, self.out)
    }
}

impl RecordSink for ProjectingSink {
    fn consume(&mut self, bytes: &[u8]) -> Result<()> {
        self.projection.project_into(bytes, &mut self.out);
        Ok(())
    }

    fn chunk_size(&self) -> Option<usize> {
        Some(self.chunk_size)
    }
}

/// Passes bytes through to `inner`, counting them.
struct CountingSink<'s> {
    inner: &'s mut dyn RecordSink,
    bytes: u64,
}

impl RecordSink for CountingSink<'_> {
    fn consume(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes += bytes.len() as u64;
        self.inner.consume(bytes)
    }

    fn chunk_size(&self) -> Option<usize> {
        self.inner.chunk_size()
    }
}

/// One node of a data block tree, identified by its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBlock {
    Plain { offset: u64, header: BlockHeader },
    VariableLength { offset: u64, header: BlockHeader },
    Compressed { offset: u64, header: BlockHeader },
    DataList { offset: u64, header: BlockHeader },
    HeaderList { offset: u64, header: BlockHeader },
}

impl RawBlock {
    /// Read the header at `offset` and classify the block.
    pub fn load(source: &mut dyn ByteSource, offset: u64) -> Result<Self> {
        let header = load_header(source, offset)?;
        debug!(
            "{} block at {:#x}, {} bytes",
            header.id, offset, header.length
        );
        Ok(match header.id.as_str() {
            "##DT" | "##RD" => RawBlock::Plain { offset, header },
            "##SD" => RawBlock::VariableLength { offset, header },
            "##DZ" => RawBlock::Compressed { offset, header },
            "##DL" => RawBlock::DataList { offset, header },
            "##HL" => RawBlock::HeaderList { offset, header },
            _ => {
                return Err(Error::BlockIDError {
                    actual: header.id,
                    expected: "##DT, ##RD, ##SD, ##DZ, ##DL or ##HL".to_string(),
                });
            }
        })
    }

    /// Decode the tree rooted at this block into `sink`.
    ///
    /// `zip_override` replaces the zip type of every DZ block reached; header
    /// list blocks set it for their subtree.
    pub fn decode(
        self,
        source: &mut dyn ByteSource,
        content: Content,
        sink: &mut dyn RecordSink,
        zip_override: Option<ZipType>,
    ) -> Result<()> {
        let mut visited = HashSet::new();
        self.decode_tree(source, content, sink, zip_override, &mut visited)
    }

    fn decode_tree(
        self,
        source: &mut dyn ByteSource,
        content: Content,
        sink: &mut dyn RecordSink,
        zip_override: Option<ZipType>,
        visited: &mut HashSet<u64>,
    ) -> Result<()> {
        match self {
            RawBlock::Plain { offset, header } => {
                if content != Content::Records {
                    return Err(tag_mismatch(header, content));
                }
                stream_payload(source, offset, &header, content, sink)
            }
            RawBlock::VariableLength { offset, header } => {
                if content != Content::SignalData {
                    return Err(tag_mismatch(header, content));
                }
                stream_payload(source, offset, &header, content, sink)
            }
            RawBlock::Compressed { offset, .. } => {
                let (_, bytes) = load_block(source, offset)?;
                let dz = DzBlock::from_bytes(&bytes)?;
                let holds = if dz.holds_signal_data() {
                    Content::SignalData
                } else {
                    Content::Records
                };
                if holds != content {
                    return Err(Error::BlockIDError {
                        actual: format!(
                            "##DZ({})",
                            String::from_utf8_lossy(&dz.original_block_type)
                        ),
                        expected: content.expected_tag().to_string(),
                    });
                }
                if let Some(zip) = zip_override
                    && zip != dz.zip_type
                {
                    debug!(
                        "DZ block at {:#x} declares {:?}, header list imposes {:?}",
                        offset, dz.zip_type, zip
                    );
                }
                let data = dz.decompress(zip_override)?;
                debug!(
                    "DZ block at {:#x}: {} -> {} bytes",
                    offset,
                    dz.compressed_data_length,
                    data.len()
                );
                sink.consume(&data)
            }
            RawBlock::DataList { offset, .. } => {
                let mut counted = CountingSink { inner: sink, bytes: 0 };
                let mut next = offset;
                while next != 0 {
                    if !visited.insert(next) {
                        return Err(Error::InvalidLayout(format!(
                            "data list chain loops back to {next:#x}"
                        )));
                    }
                    let (_, bytes) = load_block(source, next)?;
                    let dl = DataListBlock::from_bytes(&bytes)?;
                    if dl.data_block_nr == 0 {
                        return Err(Error::EmptyDataList { address: next });
                    }
                    let list_start = counted.bytes;
                    for (index, fragment) in dl.fragments() {
                        if let Some(declared) = dl.fragment_offset(index, list_start)
                            && declared != counted.bytes
                        {
                            warn!(
                                "Data list at {next:#x}: fragment {index} starts at byte {}, declared {declared}",
                                counted.bytes
                            );
                        }
                        RawBlock::load(source, fragment)?.decode_tree(
                            source,
                            content,
                            &mut counted,
                            zip_override,
                            visited,
                        )?;
                    }
                    next = dl.next;
                }
                Ok(())
            }
            RawBlock::HeaderList { offset, .. } => {
                let (_, bytes) = load_block(source, offset)?;
                let hl = HeaderListBlock::from_bytes(&bytes)?;
                if hl.first_dl == 0 {
                    return Ok(());
                }
                RawBlock::load(source, hl.first_dl)?.decode_tree(
                    source,
                    content,
                    sink,
                    Some(hl.zip_type),
                    visited,
                )
            }
        }
    }
}

fn tag_mismatch(header: BlockHeader, content: Content) -> Error {
    Error::BlockIDError {
        actual: header.id,
        expected: content.expected_tag().to_string(),
    }
}

/// Feed the payload of a plain or signal data block to `sink`, whole or in
/// pieces of the sink's chunk size.
fn stream_payload(
    source: &mut dyn ByteSource,
    offset: u64,
    header: &BlockHeader,
    content: Content,
    sink: &mut dyn RecordSink,
) -> Result<()> {
    let links = header.link_count.saturating_mul(8);
    let start = offset + BLOCK_HEADER_SIZE as u64 + links;
    let length = header.payload_len().checked_sub(links).ok_or(Error::BlockOverrun {
        id: header.id.clone(),
        requested: links as usize,
        remaining: header.payload_len() as usize,
    })?;
    if length == 0 {
        return Ok(());
    }
    match sink.chunk_size() {
        None => {
            let (_, bytes) = load_block(source, offset)?;
            let payload = match content {
                Content::Records => DataBlock::from_bytes(&bytes)?.data,
                Content::SignalData => SignalDataBlock::from_bytes(&bytes)?.data,
            };
            sink.consume(&payload)
        }
        Some(chunk) => {
            let mut done = 0u64;
            while done < length {
                let step = (chunk as u64).min(length - done);
                sink.consume(&source.read_range(start + done, step)?)?;
                done += step;
            }
            Ok(())
        }
    }
}

/// Resolve the data pointer `offset` into `sink`.
pub fn resolve(
    source: &mut dyn ByteSource,
    offset: u64,
    content: Content,
    sink: &mut dyn RecordSink,
) -> Result<()> {
    RawBlock::load(source, offset)?.decode(source, content, sink, None)
}
