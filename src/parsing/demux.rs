//! Demultiplexing of unsorted data.
//!
//! Unsorted data blocks interleave the records of several channel groups,
//! each prefixed by a little-endian record ID of 1, 2, 4 or 8 bytes. Rows of
//! a VLSD channel group are a record ID, a `u32` length and that many bytes.

use super::{
    block_decoder::{RecordSink, SignalStream},
    decoder::RecordBuffer,
};
use crate::{Error, Result, blocks::read_uint_le};
use log::warn;
use std::collections::HashMap;

/// Rows collected for one record ID.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupRows {
    /// Fixed-length records, record ID included.
    Fixed(RecordBuffer),
    /// Values of a VLSD channel group.
    Vlsd(SignalStream),
}

/// Splits an unsorted byte stream into per channel group rows.
#[derive(Debug)]
pub struct Demultiplexer {
    record_id_size: usize,
    groups: HashMap<u64, GroupRows>,
    pending: Vec<u8>,
    /// Stream position of `pending[0]`.
    position: usize,
    chunk_size: usize,
}

impl Demultiplexer {
    /// `groups` yields `(record_id, record_length, is_vlsd_group)`.
    pub fn new(
        record_id_size: usize,
        groups: impl IntoIterator<Item = (u64, usize, bool)>,
        chunk_size: usize,
    ) -> Result<Self> {
        if !matches!(record_id_size, 1 | 2 | 4 | 8) {
            return Err(Error::InvalidLayout(format!(
                "record ID size {record_id_size} is not 1, 2, 4 or 8"
            )));
        }
        let groups = groups
            .into_iter()
            .map(|(id, length, vlsd)| {
                let rows = if vlsd {
                    GroupRows::Vlsd(SignalStream::new())
                } else {
                    GroupRows::Fixed(RecordBuffer::new(length))
                };
                (id, rows)
            })
            .collect();
        Ok(Self {
            record_id_size,
            groups,
            pending: Vec::new(),
            position: 0,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Rows per record ID. Bytes of an incomplete trailing row are dropped.
    pub fn finish(self) -> HashMap<u64, GroupRows> {
        if !self.pending.is_empty() {
            warn!(
                "Unsorted data ends with {} bytes of an incomplete record",
                self.pending.len()
            );
        }
        self.groups
    }
}

impl RecordSink for Demultiplexer {
    fn consume(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        let id_size = self.record_id_size;
        let data = &self.pending;
        let mut pos = 0;

        while data.len() - pos >= id_size {
            let record_id = read_uint_le(&data[pos..pos + id_size]);
            let rows = self
                .groups
                .get_mut(&record_id)
                .ok_or(Error::UnknownRecordId {
                    record_id,
                    position: self.position + pos,
                })?;
            match rows {
                GroupRows::Fixed(buffer) => {
                    let length = buffer.record_length().max(id_size);
                    if data.len() - pos < length {
                        break;
                    }
                    buffer.extend_from_slice(&data[pos..pos + length]);
                    pos += length;
                }
                GroupRows::Vlsd(stream) => {
                    let header = id_size + 4;
                    if data.len() - pos < header {
                        break;
                    }
                    let len = read_uint_le(&data[pos + id_size..pos + header]) as usize;
                    if data.len() - pos < header + len {
                        break;
                    }
                    stream.push_value(&data[pos + header..pos + header + len]);
                    pos += header + len;
                }
            }
        }

        self.pending.drain(..pos);
        self.position += pos;
        Ok(())
    }

    fn chunk_size(&self) -> Option<usize> {
        Some(self.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_interleaved_records() {
        // id 1: 3-byte records, id 2: 2-byte records, id 3: VLSD rows
        let mut stream = vec![1, 10, 11, 2, 20, 1, 12, 13];
        stream.extend_from_slice(&[3, 2, 0, 0, 0, b'h', b'i']);
        stream.extend_from_slice(&[2, 21]);

        let mut demux =
            Demultiplexer::new(1, [(1, 3, false), (2, 2, false), (3, 0, true)], 64).unwrap();
        // arbitrary piece boundaries
        for piece in stream.chunks(3) {
            demux.consume(piece).unwrap();
        }
        let groups = demux.finish();

        match &groups[&1] {
            GroupRows::Fixed(buf) => assert_eq!(buf.as_bytes(), &[1, 10, 11, 1, 12, 13]),
            other => panic!("{other:?}"),
        }
        match &groups[&2] {
            GroupRows::Fixed(buf) => assert_eq!(buf.row_count(), 2),
            other => panic!("{other:?}"),
        }
        match &groups[&3] {
            GroupRows::Vlsd(values) => {
                let all: Vec<_> = values.values().map(|v| v.unwrap()).collect();
                assert_eq!(all, vec![(0, &b"hi"[..])]);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn two_byte_record_ids() {
        let stream = [0x01, 0x02, 7, 0x01, 0x02, 8];
        let mut demux = Demultiplexer::new(2, [(0x0201, 3, false)], 64).unwrap();
        demux.consume(&stream).unwrap();
        match &demux.finish()[&0x0201] {
            GroupRows::Fixed(buf) => assert_eq!(buf.row_count(), 2),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn unknown_record_id_reports_position() {
        let mut demux = Demultiplexer::new(1, [(1, 2, false)], 64).unwrap();
        assert!(matches!(
            demux.consume(&[1, 0, 9, 0]),
            Err(Error::UnknownRecordId {
                record_id: 9,
                position: 2
            })
        ));
    }

    #[test]
    fn invalid_record_id_size() {
        assert!(Demultiplexer::new(3, Vec::<(u64, usize, bool)>::new(), 64).is_err());
    }
}
