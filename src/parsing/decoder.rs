//! Turns record bytes into typed channel arrays.
//!
//! Integers are read in the channel's byte order, shifted right by the bit
//! offset and masked to the bit count; signed values are sign extended from
//! their top bit. Text is decoded per encoding with trailing NULs removed.

use super::raw_channel::{
    CAN_OPEN_DATE_FIELDS, CAN_OPEN_TIME_FIELDS, RecordChannel, StorageFormat, TextEncoding,
};
use crate::{blocks::DataType, types::ChannelData};
use encoding_rs::{UTF_16BE, UTF_16LE};

/// Fixed-length records stored back to back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBuffer {
    record_length: usize,
    data: Vec<u8>,
    /// Row count of zero-length records, which leave no bytes behind.
    empty_rows: usize,
}

impl RecordBuffer {
    pub fn new(record_length: usize) -> Self {
        Self::with_data(record_length, Vec::new())
    }

    pub fn with_data(record_length: usize, data: Vec<u8>) -> Self {
        Self {
            record_length,
            data,
            empty_rows: 0,
        }
    }

    /// `count` records that keep no bytes, as left by a projection onto
    /// virtual channels only.
    pub fn empty_rows(count: usize) -> Self {
        Self {
            empty_rows: count,
            ..Self::default()
        }
    }

    pub fn record_length(&self) -> usize {
        self.record_length
    }

    /// Append raw bytes. Records may be split across calls.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Complete records, in append order.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let usable = if self.record_length == 0 {
            0
        } else {
            self.data.len() - self.data.len() % self.record_length
        };
        self.data[..usable].chunks_exact(self.record_length.max(1))
    }

    pub fn row_count(&self) -> usize {
        self.data
            .len()
            .checked_div(self.record_length)
            .unwrap_or(self.empty_rows)
    }

    /// Bytes of an incomplete trailing record.
    pub fn trailing_bytes(&self) -> usize {
        self.data.len().checked_rem(self.record_length).unwrap_or(self.data.len())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Decode one channel out of every record.
///
/// Returns one `(name, data)` pair, or one pair per sub-field for the
/// CANopen date and time composites.
pub fn extract_channel(channel: &RecordChannel, records: &RecordBuffer) -> Vec<(String, ChannelData)> {
    let beg = channel.pos_beg;
    match channel.storage {
        StorageFormat::Unsigned { width, big_endian } => vec![(
            channel.name.clone(),
            integer_array(channel, records, width, false, big_endian),
        )],
        StorageFormat::Signed { width, big_endian } => vec![(
            channel.name.clone(),
            integer_array(channel, records, width, true, big_endian),
        )],
        StorageFormat::Float { width: 4, big_endian } => {
            let values = records
                .rows()
                .map(|row| {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(&row[beg..beg + 4]);
                    if big_endian {
                        f32::from_be_bytes(b)
                    } else {
                        f32::from_le_bytes(b)
                    }
                })
                .collect();
            vec![(channel.name.clone(), ChannelData::Float32(values))]
        }
        StorageFormat::Float { big_endian, .. } => {
            let values = records
                .rows()
                .map(|row| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(&row[beg..beg + 8]);
                    if big_endian {
                        f64::from_be_bytes(b)
                    } else {
                        f64::from_le_bytes(b)
                    }
                })
                .collect();
            vec![(channel.name.clone(), ChannelData::Float64(values))]
        }
        StorageFormat::Text { width, encoding } => {
            let values = records
                .rows()
                .map(|row| decode_text(&row[beg..beg + width], encoding))
                .collect();
            vec![(channel.name.clone(), ChannelData::Strings(values))]
        }
        StorageFormat::Bytes { width } => {
            let values = records
                .rows()
                .map(|row| row[beg..beg + width].to_vec())
                .collect();
            vec![(channel.name.clone(), ChannelData::Bytes(values))]
        }
        StorageFormat::CanOpenDate => can_open_date(&channel.name, beg, records),
        StorageFormat::CanOpenTime => can_open_time(&channel.name, beg, records),
    }
}

fn fold_le(bytes: &[u8]) -> u128 {
    bytes.iter().rev().fold(0u128, |acc, &b| (acc << 8) | b as u128)
}

fn fold_be(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128)
}

/// Read the bit field of `channel` from one record.
pub fn extract_bits(channel: &RecordChannel, row: &[u8], signed: bool, big_endian: bool) -> u64 {
    let bytes = &row[channel.pos_beg..channel.pos_beg + channel.span()];
    let raw = if big_endian { fold_be(bytes) } else { fold_le(bytes) };
    let bits = channel.bit_count;
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let value = (raw >> channel.bit_offset) as u64 & mask;
    if signed && bits < 64 && value & (1u64 << (bits - 1)) != 0 {
        value | !mask
    } else {
        value
    }
}

fn integer_array(
    channel: &RecordChannel,
    records: &RecordBuffer,
    width: u8,
    signed: bool,
    big_endian: bool,
) -> ChannelData {
    let values = records
        .rows()
        .map(|row| extract_bits(channel, row, signed, big_endian));
    match (width, signed) {
        (1, false) => ChannelData::UInt8(values.map(|v| v as u8).collect()),
        (2, false) => ChannelData::UInt16(values.map(|v| v as u16).collect()),
        (4, false) => ChannelData::UInt32(values.map(|v| v as u32).collect()),
        (_, false) => ChannelData::UInt64(values.collect()),
        (1, true) => ChannelData::Int8(values.map(|v| v as i8).collect()),
        (2, true) => ChannelData::Int16(values.map(|v| v as i16).collect()),
        (4, true) => ChannelData::Int32(values.map(|v| v as i32).collect()),
        (_, true) => ChannelData::Int64(values.map(|v| v as i64).collect()),
    }
}

/// Decode text bytes and strip trailing NULs.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    let text = match encoding {
        TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Utf16LE => UTF_16LE.decode_without_bom_handling(bytes).0.into_owned(),
        TextEncoding::Utf16BE => UTF_16BE.decode_without_bom_handling(bytes).0.into_owned(),
    };
    text.trim_end_matches('\0').to_string()
}

/// Decode variable-length values according to the channel data type:
/// strings for the text types, raw bytes otherwise.
pub fn decode_vlsd_values<'a>(
    data_type: DataType,
    values: impl Iterator<Item = &'a [u8]>,
) -> ChannelData {
    let encoding = match data_type {
        DataType::StringLatin1 => Some(TextEncoding::Latin1),
        DataType::StringUtf8 => Some(TextEncoding::Utf8),
        DataType::StringUtf16LE => Some(TextEncoding::Utf16LE),
        DataType::StringUtf16BE => Some(TextEncoding::Utf16BE),
        _ => None,
    };
    match encoding {
        Some(encoding) => {
            ChannelData::Strings(values.map(|v| decode_text(v, encoding)).collect())
        }
        None => ChannelData::Bytes(values.map(<[u8]>::to_vec).collect()),
    }
}

fn can_open_date(name: &str, beg: usize, records: &RecordBuffer) -> Vec<(String, ChannelData)> {
    let rows: Vec<&[u8]> = records.rows().map(|row| &row[beg..beg + 7]).collect();
    let byte = |index: usize, mask: u8| -> ChannelData {
        ChannelData::UInt8(rows.iter().map(|r| r[index] & mask).collect())
    };
    let [ms, min, hour, day, month, year] = CAN_OPEN_DATE_FIELDS;
    vec![
        (
            format!("{name}_{ms}"),
            ChannelData::UInt16(rows.iter().map(|r| u16::from_le_bytes([r[0], r[1]])).collect()),
        ),
        (format!("{name}_{min}"), byte(2, 0x3F)),
        (format!("{name}_{hour}"), byte(3, 0x1F)),
        (format!("{name}_{day}"), byte(4, 0x1F)),
        (format!("{name}_{month}"), byte(5, 0x3F)),
        (format!("{name}_{year}"), byte(6, 0x7F)),
    ]
}

fn can_open_time(name: &str, beg: usize, records: &RecordBuffer) -> Vec<(String, ChannelData)> {
    let rows: Vec<&[u8]> = records.rows().map(|row| &row[beg..beg + 6]).collect();
    let [ms, days] = CAN_OPEN_TIME_FIELDS;
    vec![
        (
            format!("{name}_{ms}"),
            ChannelData::UInt32(
                rows.iter()
                    .map(|r| u32::from_le_bytes([r[0], r[1], r[2], r[3]]) & 0x0FFF_FFFF)
                    .collect(),
            ),
        ),
        (
            format!("{name}_{days}"),
            ChannelData::UInt16(rows.iter().map(|r| u16::from_le_bytes([r[4], r[5]])).collect()),
        ),
    ]
}
