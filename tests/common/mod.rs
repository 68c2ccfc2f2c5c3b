//! Hand-built MDF images for the integration tests.
#![allow(dead_code)]

use mdf4_reader::blocks::transpose;
use mdf4_reader::info::channel_type;
use mdf4_reader::{ChannelGroupInfo, ChannelInfo, DataGroupInfo, DataType};

/// Blocks appended one after the other, 8-byte aligned. Address 0 is never
/// handed out since it means "no block".
pub struct Image {
    bytes: Vec<u8>,
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

impl Image {
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; 64],
        }
    }

    pub fn block(&mut self, id: &[u8; 4], links: &[u64], payload: &[u8]) -> u64 {
        let offset = self.bytes.len() as u64;
        let length = (24 + links.len() * 8 + payload.len()) as u64;
        self.bytes.extend_from_slice(id);
        self.bytes.extend_from_slice(&0u32.to_le_bytes());
        self.bytes.extend_from_slice(&length.to_le_bytes());
        self.bytes.extend_from_slice(&(links.len() as u64).to_le_bytes());
        for link in links {
            self.bytes.extend_from_slice(&link.to_le_bytes());
        }
        self.bytes.extend_from_slice(payload);
        while self.bytes.len() % 8 != 0 {
            self.bytes.push(0);
        }
        offset
    }

    pub fn dt(&mut self, payload: &[u8]) -> u64 {
        self.block(b"##DT", &[], payload)
    }

    pub fn sd(&mut self, values: &[&[u8]]) -> u64 {
        self.block(b"##SD", &[], &signal_data(values))
    }

    /// Data list with explicit offsets; `equal_length` switches to the
    /// equal-length form.
    pub fn dl(&mut self, next: u64, blocks: &[u64], equal_length: Option<u64>) -> u64 {
        let mut links = vec![next];
        links.extend_from_slice(blocks);
        let mut payload = Vec::new();
        payload.push(u8::from(equal_length.is_some()));
        payload.extend_from_slice(&[0; 3]);
        payload.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        match equal_length {
            Some(length) => payload.extend_from_slice(&length.to_le_bytes()),
            None => {
                for i in 0..blocks.len() as u64 {
                    payload.extend_from_slice(&i.to_le_bytes());
                }
            }
        }
        self.block(b"##DL", &links, &payload)
    }

    pub fn hl(&mut self, first_dl: u64, zip_type: u8) -> u64 {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.push(zip_type);
        payload.extend_from_slice(&[0; 5]);
        self.block(b"##HL", &[first_dl], &payload)
    }

    /// Compress `data` into a DZ block. With zip type 1 the records of
    /// `zip_parameter` bytes are transposed first.
    pub fn dz(&mut self, original: &[u8; 2], zip_type: u8, zip_parameter: u32, data: &[u8]) -> u64 {
        let stored = if zip_type == 1 && zip_parameter > 0 {
            let cols = zip_parameter as usize;
            transpose(data, data.len() / cols, cols)
        } else {
            data.to_vec()
        };
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&stored, 6);
        let mut payload = Vec::new();
        payload.extend_from_slice(original);
        payload.push(zip_type);
        payload.push(0);
        payload.extend_from_slice(&zip_parameter.to_le_bytes());
        payload.extend_from_slice(&(data.len() as u64).to_le_bytes());
        payload.extend_from_slice(&(compressed.len() as u64).to_le_bytes());
        payload.extend_from_slice(&compressed);
        self.block(b"##DZ", &[], &payload)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// `u32 length + bytes` runs.
pub fn signal_data(values: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(value);
    }
    out
}

pub fn channel(name: &str, data_type: DataType, byte_offset: u32, bit_count: u32) -> ChannelInfo {
    ChannelInfo {
        name: name.into(),
        channel_type: channel_type::FIXED_LENGTH,
        data_type,
        byte_offset,
        bit_count,
        ..Default::default()
    }
}

pub fn master(name: &str, byte_offset: u32, bit_count: u32) -> ChannelInfo {
    ChannelInfo {
        channel_type: channel_type::MASTER,
        ..channel(name, DataType::UnsignedIntegerLE, byte_offset, bit_count)
    }
}

pub fn channel_group(record_id: u64, data_bytes: u32, channels: Vec<ChannelInfo>) -> ChannelGroupInfo {
    ChannelGroupInfo {
        record_id,
        data_bytes,
        channels: channels
            .into_iter()
            .enumerate()
            .map(|(i, c)| (i as u32, c))
            .collect(),
        ..Default::default()
    }
}

pub fn sorted_group(data_block_addr: u64, group: ChannelGroupInfo) -> DataGroupInfo {
    DataGroupInfo {
        data_block_addr,
        channel_groups: [(0, group)].into(),
        ..Default::default()
    }
}

/// Records of a `u16` counter followed by a `f32` value.
pub fn counter_records(range: std::ops::Range<u16>) -> Vec<u8> {
    let mut out = Vec::new();
    for i in range {
        out.extend_from_slice(&i.to_le_bytes());
        out.extend_from_slice(&(i as f32 * 0.5).to_le_bytes());
    }
    out
}

pub fn counter_group() -> ChannelGroupInfo {
    channel_group(
        0,
        6,
        vec![
            master("time", 0, 16),
            channel("value", DataType::FloatLE, 2, 32),
        ],
    )
}
