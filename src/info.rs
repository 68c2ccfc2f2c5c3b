//! Metadata describing where data lives and how it is laid out.
//!
//! The reader does not parse DG/CG/CN/CC blocks itself. An [`MdfInfo`],
//! produced by whatever parsed the metadata blocks, supplies per data group,
//! channel group and channel the block addresses, record layout and
//! conversion parameters. Groups and channels are keyed by their number.
//!
//! With the `serde` feature the description can be persisted as JSON:
//!
//! ```no_run
//! use mdf4_reader::{MdfInfo, ReadOptions, Result, read_file};
//!
//! fn read_with_saved_info() -> Result<()> {
//!     let info = MdfInfo::from_json_file("recording.info.json")?;
//!     let outcome = read_file("recording.mf4", &info, &ReadOptions::default())?;
//!     for (name, channel) in &outcome.channels {
//!         println!("{name}: {} samples", channel.data.len());
//!     }
//!     Ok(())
//! }
//! ```

use crate::blocks::{ConversionType, DataType};
use std::collections::BTreeMap;

/// `cn_type` values.
pub mod channel_type {
    pub const FIXED_LENGTH: u8 = 0;
    pub const VLSD: u8 = 1;
    pub const MASTER: u8 = 2;
    pub const VIRTUAL_MASTER: u8 = 3;
    pub const SYNC: u8 = 4;
    pub const MAX_LENGTH: u8 = 5;
    pub const VIRTUAL_DATA: u8 = 6;
}

/// Complete description of the data groups of one file.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MdfInfo {
    pub data_groups: BTreeMap<u32, DataGroupInfo>,
}

/// One data group: a data block chain shared by one or more channel groups.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DataGroupInfo {
    /// Address of the first DT/RD/DZ/DL/HL block, 0 when the group holds no data.
    pub data_block_addr: u64,
    /// Size of the record ID prefix (0, 1, 2, 4 or 8 bytes).
    pub record_id_size: u8,
    pub comment: Option<String>,
    pub channel_groups: BTreeMap<u32, ChannelGroupInfo>,
}

/// Layout of the records of one channel group.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelGroupInfo {
    pub record_id: u64,
    /// Number of records in the group.
    pub cycle_count: u64,
    /// Record payload size, excluding record ID and invalidation bytes.
    pub data_bytes: u32,
    pub invalidation_bytes: u32,
    /// `cg_flags`; bit 0 marks a VLSD channel group.
    pub flags: u16,
    pub acq_name: Option<String>,
    pub channels: BTreeMap<u32, ChannelInfo>,
}

/// Physical encoding and presentation of one channel.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelInfo {
    pub name: String,
    pub unit: Option<String>,
    pub description: Option<String>,
    /// `cn_type`, see [`channel_type`].
    pub channel_type: u8,
    /// `cn_sync_type` (1 = time, 2 = angle, ...).
    pub sync_type: u8,
    pub data_type: DataType,
    pub bit_offset: u8,
    /// Byte offset after the record ID.
    pub byte_offset: u32,
    pub bit_count: u32,
    /// For VLSD channels: address of the signal data (SD, DZ, DL or HL).
    pub data_addr: u64,
    /// For VLSD channels stored in a VLSD channel group: that group's record ID.
    pub vlsd_record_id: Option<u64>,
    pub conversion: Option<ConversionInfo>,
}

/// Parameters of a `CC` block, with referenced texts already resolved.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConversionInfo {
    pub conversion_type: ConversionType,
    /// `cc_val` parameter table.
    pub values: Vec<f64>,
    /// `cc_ref` table resolved to text; `None` where a reference is empty.
    pub texts: Vec<Option<String>>,
    /// Algebraic formula for [`ConversionType::Algebraic`].
    pub formula: Option<String>,
}

impl MdfInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_group(&self, number: u32) -> Option<&DataGroupInfo> {
        self.data_groups.get(&number)
    }

    /// Parse a JSON description.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON description from disk.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save the description as pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl DataGroupInfo {
    /// Data blocks hold a single channel group without record IDs.
    pub fn is_sorted(&self) -> bool {
        self.record_id_size == 0
    }
}

impl ChannelGroupInfo {
    /// The group carries `u32 length + bytes` rows for a VLSD channel.
    pub fn is_vlsd_group(&self) -> bool {
        self.flags & 1 != 0
    }

    /// Bytes per record including the record ID prefix.
    pub fn record_length(&self, record_id_size: u8) -> usize {
        record_id_size as usize + self.data_bytes as usize + self.invalidation_bytes as usize
    }

    /// The group's master channel, if it has one.
    pub fn master(&self) -> Option<&ChannelInfo> {
        self.channels.values().find(|c| c.is_master())
    }
}

impl ChannelInfo {
    pub fn is_master(&self) -> bool {
        matches!(
            self.channel_type,
            channel_type::MASTER | channel_type::VIRTUAL_MASTER
        )
    }

    /// Virtual channels occupy no record bytes; their samples are row indices.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self.channel_type,
            channel_type::VIRTUAL_MASTER | channel_type::VIRTUAL_DATA
        )
    }

    pub fn is_vlsd(&self) -> bool {
        self.channel_type == channel_type::VLSD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str, channel_type: u8) -> ChannelInfo {
        ChannelInfo {
            name: name.to_string(),
            channel_type,
            ..Default::default()
        }
    }

    #[test]
    fn master_lookup() {
        let mut group = ChannelGroupInfo::default();
        group.channels.insert(0, channel("speed", channel_type::FIXED_LENGTH));
        group.channels.insert(1, channel("t", channel_type::VIRTUAL_MASTER));
        assert_eq!(group.master().map(|c| c.name.as_str()), Some("t"));
        assert!(group.channels[&1].is_virtual());
    }

    #[test]
    fn record_length_counts_prefix_and_invalidation() {
        let group = ChannelGroupInfo {
            data_bytes: 10,
            invalidation_bytes: 1,
            ..Default::default()
        };
        assert_eq!(group.record_length(2), 13);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_round_trip() {
        let json = r#"{
            "data_groups": {
                "0": {
                    "data_block_addr": 4096,
                    "channel_groups": {
                        "0": {
                            "cycle_count": 3,
                            "data_bytes": 4,
                            "channels": {
                                "0": { "name": "rpm", "data_type": 0, "bit_count": 16,
                                       "conversion": { "conversion_type": 1, "values": [2.0, 3.0] } }
                            }
                        }
                    }
                }
            }
        }"#;
        let info = MdfInfo::from_json(json).unwrap();
        let dg = info.data_group(0).unwrap();
        assert!(dg.is_sorted());
        let rpm = &dg.channel_groups[&0].channels[&0];
        assert_eq!(rpm.data_type, DataType::UnsignedIntegerLE);
        let conv = rpm.conversion.as_ref().unwrap();
        assert_eq!(conv.conversion_type, ConversionType::Linear);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        info.save_to_file(tmp.path()).unwrap();
        assert_eq!(MdfInfo::from_json_file(tmp.path()).unwrap(), info);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            MdfInfo::from_json("{\"data_groups\": 3}"),
            Err(crate::Error::InvalidInfo(_))
        ));
    }
}
