//! Shared types used across the library.
//!
//! [`ChannelData`] is the decoded, possibly converted, sample array of one
//! channel. Numeric storage keeps the narrowest primitive the record layout
//! declared, so a 12-bit counter comes back as `u16` and not as `f64`.

/// The samples of one channel, one entry per record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelData {
    UInt8(Vec<u8>),
    Int8(Vec<i8>),
    UInt16(Vec<u16>),
    Int16(Vec<i16>),
    UInt32(Vec<u32>),
    Int32(Vec<i32>),
    UInt64(Vec<u64>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// Text decoded from Latin-1, UTF-8 or UTF-16 with trailing NULs removed.
    Strings(Vec<String>),
    /// Fixed-width byte arrays or variable-length blobs.
    Bytes(Vec<Vec<u8>>),
}

macro_rules! numeric_arms {
    ($self:expr, $v:ident => $body:expr, $other:expr) => {
        match $self {
            ChannelData::UInt8($v) => $body,
            ChannelData::Int8($v) => $body,
            ChannelData::UInt16($v) => $body,
            ChannelData::Int16($v) => $body,
            ChannelData::UInt32($v) => $body,
            ChannelData::Int32($v) => $body,
            ChannelData::UInt64($v) => $body,
            ChannelData::Int64($v) => $body,
            ChannelData::Float32($v) => $body,
            ChannelData::Float64($v) => $body,
            _ => $other,
        }
    };
}

impl ChannelData {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            ChannelData::Strings(v) => v.len(),
            ChannelData::Bytes(v) => v.len(),
            other => numeric_arms!(other, v => v.len(), 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this is an integer array (signed or unsigned).
    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ChannelData::UInt8(_)
                | ChannelData::Int8(_)
                | ChannelData::UInt16(_)
                | ChannelData::Int16(_)
                | ChannelData::UInt32(_)
                | ChannelData::Int32(_)
                | ChannelData::UInt64(_)
                | ChannelData::Int64(_)
        )
    }

    /// Returns true if this is a floating point array.
    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, ChannelData::Float32(_) | ChannelData::Float64(_))
    }

    /// Returns true for numeric arrays of any width.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Widen a numeric array to `f64`. Text and byte arrays yield `None`.
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        numeric_arms!(self, v => Some(v.iter().map(|&x| x as f64).collect()), None)
    }

    /// Borrow the samples of a text array.
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            ChannelData::Strings(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the samples of a byte-array channel.
    pub fn as_bytes(&self) -> Option<&[Vec<u8>]> {
        match self {
            ChannelData::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Row index sequence `0..count`, used for virtual channels.
    pub fn row_index(count: usize) -> Self {
        ChannelData::UInt64((0..count as u64).collect())
    }
}
