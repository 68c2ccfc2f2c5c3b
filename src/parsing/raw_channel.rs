//! Physical encoding of one channel inside a record.

use crate::{
    Error, Result,
    blocks::DataType,
    info::{ChannelInfo, channel_type},
};
use core::fmt;

/// `cn_type` of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    FixedLength,
    Vlsd,
    Master,
    VirtualMaster,
    Sync,
    MaxLength,
    VirtualData,
    Other(u8),
}

impl From<u8> for ChannelKind {
    fn from(value: u8) -> Self {
        match value {
            channel_type::FIXED_LENGTH => ChannelKind::FixedLength,
            channel_type::VLSD => ChannelKind::Vlsd,
            channel_type::MASTER => ChannelKind::Master,
            channel_type::VIRTUAL_MASTER => ChannelKind::VirtualMaster,
            channel_type::SYNC => ChannelKind::Sync,
            channel_type::MAX_LENGTH => ChannelKind::MaxLength,
            channel_type::VIRTUAL_DATA => ChannelKind::VirtualData,
            other => ChannelKind::Other(other),
        }
    }
}

impl ChannelKind {
    /// Virtual channels take no record bytes.
    pub fn is_virtual(self) -> bool {
        matches!(self, ChannelKind::VirtualMaster | ChannelKind::VirtualData)
    }

    pub fn is_master(self) -> bool {
        matches!(self, ChannelKind::Master | ChannelKind::VirtualMaster)
    }
}

/// Sub-field suffixes of a CANopen date, in record order.
pub const CAN_OPEN_DATE_FIELDS: [&str; 6] = ["ms", "min", "hour", "day", "month", "year"];
/// Sub-field suffixes of a CANopen time, in record order.
pub const CAN_OPEN_TIME_FIELDS: [&str; 2] = ["ms", "days"];

/// Every name a read may produce for `info`.
///
/// That is the channel name, plus `<name>_offset` for VLSD channels and
/// `<name>_<field>` for the CANopen date and time sub-fields.
pub fn output_names(info: &ChannelInfo) -> Vec<String> {
    let suffixes: &[&str] = match ChannelKind::from(info.channel_type) {
        ChannelKind::Vlsd => &["offset"],
        _ => match StorageFormat::from_channel(info) {
            Ok(StorageFormat::CanOpenDate) => &CAN_OPEN_DATE_FIELDS,
            Ok(StorageFormat::CanOpenTime) => &CAN_OPEN_TIME_FIELDS,
            _ => &[],
        },
    };
    std::iter::once(info.name.clone())
        .chain(suffixes.iter().map(|suffix| format!("{}_{suffix}", info.name)))
        .collect()
}

/// Text encodings of string channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Latin1,
    Utf8,
    Utf16LE,
    Utf16BE,
}

/// Primitive a channel is stored as, derived from data type and bit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    /// Unsigned integer widened to 1, 2, 4 or 8 bytes.
    Unsigned { width: u8, big_endian: bool },
    Signed { width: u8, big_endian: bool },
    Float { width: u8, big_endian: bool },
    Text { width: usize, encoding: TextEncoding },
    Bytes { width: usize },
    /// 7-byte CANopen date split into ms/min/hour/day/month/year.
    CanOpenDate,
    /// 6-byte CANopen time split into ms/days.
    CanOpenTime,
}

impl StorageFormat {
    /// Derive the storage primitive of a channel.
    ///
    /// Integers round up to the next power-of-two byte width able to hold
    /// `bit_count` bits. Floats must be 32 or 64 bits wide and byte aligned.
    /// Text and byte arrays must be byte aligned.
    pub fn from_channel(channel: &ChannelInfo) -> Result<Self> {
        let bits = channel.bit_count;
        let unsupported = || Error::UnsupportedDataType {
            channel: channel.name.clone(),
            data_type: channel.data_type.to_u8(),
            bit_count: bits,
        };
        let big_endian = channel.data_type.is_big_endian();
        let whole_bytes = bits % 8 == 0 && channel.bit_offset == 0;

        let format = match channel.data_type {
            DataType::UnsignedIntegerLE | DataType::UnsignedIntegerBE => {
                StorageFormat::Unsigned {
                    width: integer_width(bits).ok_or_else(unsupported)?,
                    big_endian,
                }
            }
            DataType::SignedIntegerLE | DataType::SignedIntegerBE => StorageFormat::Signed {
                width: integer_width(bits).ok_or_else(unsupported)?,
                big_endian,
            },
            DataType::FloatLE | DataType::FloatBE if whole_bytes && matches!(bits, 32 | 64) => {
                StorageFormat::Float {
                    width: (bits / 8) as u8,
                    big_endian,
                }
            }
            DataType::StringLatin1
            | DataType::StringUtf8
            | DataType::StringUtf16LE
            | DataType::StringUtf16BE
                if whole_bytes =>
            {
                let encoding = match channel.data_type {
                    DataType::StringLatin1 => TextEncoding::Latin1,
                    DataType::StringUtf8 => TextEncoding::Utf8,
                    DataType::StringUtf16LE => TextEncoding::Utf16LE,
                    _ => TextEncoding::Utf16BE,
                };
                StorageFormat::Text {
                    width: (bits / 8) as usize,
                    encoding,
                }
            }
            DataType::ByteArray | DataType::MimeSample | DataType::MimeStream if whole_bytes => {
                StorageFormat::Bytes {
                    width: (bits / 8) as usize,
                }
            }
            DataType::CanOpenDate if whole_bytes && bits == 56 => StorageFormat::CanOpenDate,
            DataType::CanOpenTime if whole_bytes && bits == 48 => StorageFormat::CanOpenTime,
            _ => return Err(unsupported()),
        };
        Ok(format)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            StorageFormat::Unsigned { .. } | StorageFormat::Signed { .. }
        )
    }

    pub fn is_big_endian(&self) -> bool {
        matches!(
            self,
            StorageFormat::Unsigned { big_endian: true, .. }
                | StorageFormat::Signed { big_endian: true, .. }
                | StorageFormat::Float { big_endian: true, .. }
                | StorageFormat::Text {
                    encoding: TextEncoding::Utf16BE,
                    ..
                }
        )
    }
}

fn integer_width(bits: u32) -> Option<u8> {
    match bits {
        1..=8 => Some(1),
        9..=16 => Some(2),
        17..=32 => Some(4),
        33..=64 => Some(8),
        _ => None,
    }
}

/// Compact format code, e.g. `<u2`, `>i4`, `<f8`, `S12`, `V7`.
impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = |be: bool| if be { '>' } else { '<' };
        match self {
            StorageFormat::Unsigned { width, big_endian } => {
                write!(f, "{}u{width}", order(*big_endian))
            }
            StorageFormat::Signed { width, big_endian } => {
                write!(f, "{}i{width}", order(*big_endian))
            }
            StorageFormat::Float { width, big_endian } => {
                write!(f, "{}f{width}", order(*big_endian))
            }
            StorageFormat::Text { width, .. } => write!(f, "S{width}"),
            StorageFormat::Bytes { width } => write!(f, "V{width}"),
            StorageFormat::CanOpenDate => f.write_str("date7"),
            StorageFormat::CanOpenTime => f.write_str("time6"),
        }
    }
}

/// One channel placed inside a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChannel {
    pub name: String,
    pub kind: ChannelKind,
    pub data_type: DataType,
    pub bit_offset: u8,
    pub bit_count: u32,
    /// Byte offset after the record ID.
    pub byte_offset: u32,
    /// First record byte of the channel: record ID size plus byte offset.
    pub pos_beg: usize,
    /// `pos_beg + ceil(bit_count / 8)`.
    pub pos_end: usize,
    pub storage: StorageFormat,
    /// Index of the physical field holding the channel's bytes.
    pub field: usize,
}

impl RecordChannel {
    pub fn new(info: &ChannelInfo, record_id_size: usize) -> Result<Self> {
        let kind = ChannelKind::from(info.channel_type);
        // the record of a VLSD channel holds the offset of its value
        let storage = match kind {
            ChannelKind::Vlsd => StorageFormat::Unsigned {
                width: integer_width(info.bit_count).ok_or_else(|| Error::UnsupportedDataType {
                    channel: info.name.clone(),
                    data_type: info.data_type.to_u8(),
                    bit_count: info.bit_count,
                })?,
                big_endian: false,
            },
            _ => StorageFormat::from_channel(info)?,
        };
        let pos_beg = record_id_size + info.byte_offset as usize;
        Ok(Self {
            name: info.name.clone(),
            kind,
            data_type: info.data_type,
            bit_offset: info.bit_offset,
            bit_count: info.bit_count,
            byte_offset: info.byte_offset,
            pos_beg,
            pos_end: pos_beg + info.bit_count.div_ceil(8) as usize,
            storage,
            field: 0,
        })
    }

    /// Bytes to read from the record: the bit field plus its offset.
    pub fn span(&self) -> usize {
        (self.bit_offset as u32 + self.bit_count).div_ceil(8) as usize
    }

    /// The channel does not fill its bytes exactly.
    pub fn is_bit_field(&self) -> bool {
        self.bit_offset != 0 || self.bit_count % 8 != 0
    }
}
