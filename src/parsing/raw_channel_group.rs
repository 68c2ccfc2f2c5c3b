//! Record layout of one channel group.
//!
//! Channels that start in the same byte share one [`PhysicalField`]: the
//! record bytes are described once and every bit-packed sibling keeps its own
//! bit offset and bit count.

use super::raw_channel::{ChannelKind, RecordChannel};
use crate::{
    Error, Result,
    info::ChannelGroupInfo,
};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// A byte range of the record, shared by one or more channels.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalField {
    /// Name of the first channel stored in the field.
    pub name: String,
    /// First byte within the record.
    pub offset: usize,
    pub size: usize,
}

/// Per channel group record description.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    pub record_id: u64,
    pub record_id_size: usize,
    /// Bytes per record, record ID included.
    pub record_length: usize,
    pub cycle_count: u64,
    pub fields: Vec<PhysicalField>,
    /// Channels backed by record bytes, sorted by byte then bit offset.
    pub channels: Vec<RecordChannel>,
    /// Logical channel name to index in `fields`.
    pub aliases: BTreeMap<String, usize>,
    /// Virtual channels, synthesized as row indices.
    pub virtual_channels: Vec<String>,
    pub master: Option<String>,
    /// Names of VLSD channels; their record field holds an offset.
    pub vlsd: BTreeSet<String>,
    /// The group carries `u32 length + bytes` rows.
    pub vlsd_group: bool,
    /// Channels left out of the layout with the reason.
    pub unsupported: Vec<(String, String)>,
}

impl RecordLayout {
    /// Build the layout of `group` for data prefixed by `record_id_size`
    /// record ID bytes.
    pub fn build(group: &ChannelGroupInfo, record_id_size: u8) -> Result<Self> {
        let record_id_size = record_id_size as usize;
        let record_length = group.record_length(record_id_size as u8);
        let data_end = record_id_size + group.data_bytes as usize;

        let mut channels = Vec::new();
        let mut virtual_channels = Vec::new();
        let mut unsupported = Vec::new();
        let mut vlsd = BTreeSet::new();
        let mut master = None;

        for info in group.channels.values() {
            if info.is_master() && master.is_none() {
                master = Some(info.name.clone());
            }
            if info.is_virtual() {
                virtual_channels.push(info.name.clone());
                continue;
            }
            let channel = match RecordChannel::new(info, record_id_size) {
                Ok(channel) => channel,
                Err(e @ Error::UnsupportedDataType { .. }) => {
                    warn!("Skipping channel {:?}: {}", info.name, e);
                    unsupported.push((info.name.clone(), e.to_string()));
                    continue;
                }
                Err(e) => return Err(e),
            };
            if channel.pos_beg + channel.span() > data_end && !group.is_vlsd_group() {
                return Err(Error::InvalidLayout(format!(
                    "channel {:?} ends at byte {} beyond the {} data bytes of record {}",
                    channel.name,
                    channel.pos_beg + channel.span(),
                    data_end,
                    group.record_id
                )));
            }
            if channel.kind == ChannelKind::Vlsd {
                vlsd.insert(channel.name.clone());
            }
            channels.push(channel);
        }

        channels.sort_by_key(|c| (c.byte_offset, c.bit_offset));

        let mut fields: Vec<PhysicalField> = Vec::new();
        let mut aliases = BTreeMap::new();
        let mut previous: Option<u32> = None;
        for channel in &mut channels {
            let shares_bytes = previous == Some(channel.byte_offset)
                && channel.storage.is_integer()
                && fields.last().is_some();
            if shares_bytes {
                let index = fields.len() - 1;
                let field = &mut fields[index];
                field.size = field.size.max(channel.span());
                channel.field = index;
                debug!("Channel {:?} aliases field {:?}", channel.name, field.name);
            } else {
                channel.field = fields.len();
                fields.push(PhysicalField {
                    name: channel.name.clone(),
                    offset: channel.pos_beg,
                    size: channel.span(),
                });
            }
            aliases.insert(channel.name.clone(), channel.field);
            previous = Some(channel.byte_offset);
        }

        Ok(Self {
            record_id: group.record_id,
            record_id_size,
            record_length,
            cycle_count: group.cycle_count,
            fields,
            channels,
            aliases,
            virtual_channels,
            master,
            vlsd,
            vlsd_group: group.is_vlsd_group(),
            unsupported,
        })
    }

    /// Composite record descriptor: one `(name, format)` per physical field.
    pub fn descriptor(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let format = self
                    .channels
                    .iter()
                    .find(|c| c.field == index)
                    .map(|c| c.storage.to_string())
                    .unwrap_or_default();
                (field.name.clone(), format)
            })
            .collect()
    }

    pub fn field_of(&self, name: &str) -> Option<&PhysicalField> {
        self.aliases.get(name).map(|&i| &self.fields[i])
    }

    pub fn channel(&self, name: &str) -> Option<&RecordChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Keep the channels named in `wanted` plus the master channel.
    ///
    /// The returned layout describes compact records made only of the kept
    /// fields, without record ID; [`Projection`] copies those ranges out of
    /// full records.
    pub fn project(&self, wanted: &BTreeSet<String>) -> (RecordLayout, Projection) {
        let keep = |name: &String| wanted.contains(name) || self.master.as_ref() == Some(name);

        let mut used: Vec<usize> = self
            .channels
            .iter()
            .filter(|c| keep(&c.name))
            .map(|c| c.field)
            .collect();
        used.sort_unstable();
        used.dedup();

        let mut fields = Vec::with_capacity(used.len());
        let mut ranges = Vec::with_capacity(used.len());
        let mut remap = BTreeMap::new();
        let mut offset = 0;
        for &old in &used {
            let field = &self.fields[old];
            remap.insert(old, fields.len());
            ranges.push((field.offset, field.size));
            fields.push(PhysicalField {
                name: field.name.clone(),
                offset,
                size: field.size,
            });
            offset += field.size;
        }

        let channels: Vec<RecordChannel> = self
            .channels
            .iter()
            .filter(|c| keep(&c.name))
            .filter_map(|c| {
                let new_field = *remap.get(&c.field)?;
                let mut channel = c.clone();
                let shift = c.pos_beg - self.fields[c.field].offset;
                channel.pos_beg = fields[new_field].offset + shift;
                channel.pos_end = channel.pos_beg + (c.pos_end - c.pos_beg);
                channel.field = new_field;
                Some(channel)
            })
            .collect();
        let aliases = channels
            .iter()
            .map(|c| (c.name.clone(), c.field))
            .collect();

        let layout = RecordLayout {
            record_id: self.record_id,
            record_id_size: 0,
            record_length: offset,
            cycle_count: self.cycle_count,
            fields,
            channels,
            aliases,
            virtual_channels: self
                .virtual_channels
                .iter()
                .filter(|n| keep(n))
                .cloned()
                .collect(),
            master: self.master.clone(),
            vlsd: self.vlsd.iter().filter(|n| keep(n)).cloned().collect(),
            vlsd_group: self.vlsd_group,
            unsupported: self
                .unsupported
                .iter()
                .filter(|(n, _)| keep(n))
                .cloned()
                .collect(),
        };
        let projection = Projection {
            source_length: self.record_length,
            ranges,
            pending: Vec::new(),
            records: 0,
        };
        (layout, projection)
    }
}

/// Copies the kept byte ranges of full records into compact records.
///
/// Input may arrive in arbitrary pieces; a record split across two pieces is
/// carried over until complete.
#[derive(Debug, Clone)]
pub struct Projection {
    source_length: usize,
    /// `(offset, size)` within a full record, in output order.
    ranges: Vec<(usize, usize)>,
    pending: Vec<u8>,
    records: usize,
}

impl Projection {
    /// Append the projection of the complete records in `bytes` to `out`.
    pub fn project_into(&mut self, bytes: &[u8], out: &mut Vec<u8>) {
        if self.source_length == 0 {
            return;
        }
        let mut input = bytes;
        if !self.pending.is_empty() {
            let missing = self.source_length - self.pending.len();
            let take = missing.min(input.len());
            self.pending.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.pending.len() < self.source_length {
                return;
            }
            let record = std::mem::take(&mut self.pending);
            self.copy_record(&record, out);
            self.records += 1;
        }
        let mut records = input.chunks_exact(self.source_length);
        for record in &mut records {
            self.copy_record(record, out);
            self.records += 1;
        }
        self.pending.extend_from_slice(records.remainder());
    }

    fn copy_record(&self, record: &[u8], out: &mut Vec<u8>) {
        for &(offset, size) in &self.ranges {
            out.extend_from_slice(&record[offset..offset + size]);
        }
    }

    /// Bytes of an incomplete trailing record.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Complete source records seen so far, whether or not any of their
    /// bytes were kept.
    pub fn records(&self) -> usize {
        self.records
    }
}
