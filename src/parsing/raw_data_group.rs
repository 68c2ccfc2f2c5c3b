//! Decoding of one data group into named channel arrays.

use super::{
    block_decoder::{Content, ProjectingSink, SignalStream, resolve},
    decoder::{RecordBuffer, decode_vlsd_values, extract_channel},
    demux::{Demultiplexer, GroupRows},
    raw_channel::output_names,
    raw_channel_group::RecordLayout,
    source::ByteSource,
};
use crate::{
    Error, Result,
    blocks::{FormulaEvaluator, conversion},
    channel::{Channel, ReadOutcome, UnavailableReason},
    info::{ChannelGroupInfo, ChannelInfo, DataGroupInfo},
    mdf::ReadOptions,
    types::ChannelData,
};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How the data block of a group is organised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// No data block.
    Empty,
    /// One channel group, records without record ID.
    Sorted,
    /// Several channel groups interleaved, each record led by its ID.
    Unsorted,
}

/// Reads one data group.
pub struct DataGroupReader<'a> {
    number: u32,
    group: &'a DataGroupInfo,
    options: &'a ReadOptions,
    evaluator: &'a dyn FormulaEvaluator,
    /// Described channels the allow-list selects, directly or through one of
    /// their derived output names. `None` reads everything.
    selected: Option<BTreeSet<String>>,
}

impl<'a> DataGroupReader<'a> {
    pub fn new(
        number: u32,
        group: &'a DataGroupInfo,
        options: &'a ReadOptions,
        evaluator: &'a dyn FormulaEvaluator,
    ) -> Self {
        let selected = options.channels.is_some().then(|| {
            group
                .channel_groups
                .values()
                .flat_map(|cg| cg.channels.values())
                .filter(|c| output_names(c).iter().any(|name| options.wants(name)))
                .map(|c| c.name.clone())
                .collect()
        });
        Self {
            number,
            group,
            options,
            evaluator,
            selected,
        }
    }

    pub fn state(&self) -> GroupState {
        if self.group.data_block_addr == 0 {
            GroupState::Empty
        } else if self.group.is_sorted() {
            GroupState::Sorted
        } else {
            GroupState::Unsorted
        }
    }

    /// True if at least one channel of the group passes the allow-list.
    pub fn is_wanted(&self) -> bool {
        self.selected.as_ref().is_none_or(|s| !s.is_empty())
    }

    pub fn read(&self, source: &mut dyn ByteSource) -> Result<ReadOutcome> {
        let mut outcome = ReadOutcome::default();
        match self.state() {
            GroupState::Empty => {
                warn!("Data group {}: no data block", self.number);
                for cg in self.group.channel_groups.values() {
                    self.mark_group(cg, &mut outcome, UnavailableReason::NoData);
                }
            }
            GroupState::Sorted => self.read_sorted(source, &mut outcome)?,
            GroupState::Unsorted => self.read_unsorted(source, &mut outcome)?,
        }
        info!(
            "Data group {}: {} channels decoded, {} unavailable",
            self.number,
            outcome.channels.len(),
            outcome.unavailable.len()
        );
        Ok(outcome)
    }

    fn read_sorted(&self, source: &mut dyn ByteSource, outcome: &mut ReadOutcome) -> Result<()> {
        let mut groups = self.group.channel_groups.values();
        let (Some(cg), None) = (groups.next(), groups.next()) else {
            return Err(Error::InvalidLayout(format!(
                "sorted data group {} has {} channel groups",
                self.number,
                self.group.channel_groups.len()
            )));
        };
        let full = RecordLayout::build(cg, 0)?;
        let address = self.group.data_block_addr;

        let (layout, records) = match &self.selected {
            Some(wanted) => {
                let (layout, projection) = full.project(wanted);
                let mut sink = ProjectingSink::new(projection, self.options.chunk_size);
                resolve(source, address, Content::Records, &mut sink)?;
                let records = sink.into_records(layout.record_length);
                (layout, records)
            }
            None => {
                let mut records = RecordBuffer::new(full.record_length);
                resolve(source, address, Content::Records, &mut records)?;
                if records.trailing_bytes() > 0 {
                    debug!(
                        "Data group {}: dropping {} bytes of an incomplete trailing record",
                        self.number,
                        records.trailing_bytes()
                    );
                }
                (full, records)
            }
        };

        if records.row_count() == 0 {
            warn!("Data group {}: no records at {:#x}", self.number, address);
            self.mark_group(cg, outcome, UnavailableReason::NoData);
            return Ok(());
        }
        self.emit(cg, &layout, &records, &HashMap::new(), source, outcome)
    }

    fn read_unsorted(&self, source: &mut dyn ByteSource, outcome: &mut ReadOutcome) -> Result<()> {
        let id_size = self.group.record_id_size;
        let mut demux = Demultiplexer::new(
            id_size as usize,
            self.group
                .channel_groups
                .values()
                .map(|cg| (cg.record_id, cg.record_length(id_size), cg.is_vlsd_group())),
            self.options.chunk_size,
        )?;
        resolve(source, self.group.data_block_addr, Content::Records, &mut demux)?;

        let mut fixed = HashMap::new();
        let mut streams = HashMap::new();
        for (id, rows) in demux.finish() {
            match rows {
                GroupRows::Fixed(records) => {
                    fixed.insert(id, records);
                }
                GroupRows::Vlsd(stream) => {
                    streams.insert(id, stream);
                }
            }
        }

        for cg in self.group.channel_groups.values() {
            if cg.is_vlsd_group() {
                continue;
            }
            let records = match fixed.remove(&cg.record_id) {
                Some(records) if records.row_count() > 0 => records,
                _ => {
                    warn!(
                        "Data group {}: no records with ID {}",
                        self.number, cg.record_id
                    );
                    self.mark_group(cg, outcome, UnavailableReason::NoData);
                    continue;
                }
            };
            let layout = RecordLayout::build(cg, id_size)?;
            self.emit(cg, &layout, &records, &streams, source, outcome)?;
        }
        Ok(())
    }

    /// Decode every wanted channel of `layout` out of `records`.
    fn emit(
        &self,
        cg: &ChannelGroupInfo,
        layout: &RecordLayout,
        records: &RecordBuffer,
        streams: &HashMap<u64, SignalStream>,
        source: &mut dyn ByteSource,
        outcome: &mut ReadOutcome,
    ) -> Result<()> {
        let infos: BTreeMap<&str, &ChannelInfo> = cg
            .channels
            .values()
            .map(|c| (c.name.as_str(), c))
            .collect();
        let master = layout.master.as_deref();
        let rows = records.row_count();
        if cg.cycle_count != 0 && cg.cycle_count != rows as u64 {
            debug!(
                "Record {}: {} rows decoded, {} announced",
                cg.record_id, rows, cg.cycle_count
            );
        }

        for channel in &layout.channels {
            if !self.wants(&channel.name, master) {
                continue;
            }
            let info = infos.get(channel.name.as_str()).copied();
            let decoded = extract_channel(channel, records);

            if layout.vlsd.contains(&channel.name) {
                let Some(info) = info else { continue };
                let Some((_, raw_offsets)) = decoded.into_iter().next() else {
                    continue;
                };
                let offsets = offset_values(&raw_offsets);
                let values = self.vlsd_values(info, &offsets, streams, source)?;
                outcome.insert(
                    format!("{}_offset", channel.name),
                    self.raw_channel(Some(info), raw_offsets, master),
                );
                match values {
                    Some(values) => {
                        outcome.insert(channel.name.clone(), self.channel(Some(info), values, master)?)
                    }
                    None => outcome.mark_unavailable(
                        channel.name.clone(),
                        self.number,
                        UnavailableReason::NoData,
                    ),
                }
                continue;
            }

            for (name, data) in decoded {
                // composite sub-fields carry no conversion of their own
                let entry = if name == channel.name {
                    self.channel(info, data, master)?
                } else {
                    let mut entry = self.raw_channel(info, data, master);
                    entry.conversion = None;
                    entry
                };
                outcome.insert(name, entry);
            }
        }

        for name in &layout.virtual_channels {
            if !self.wants(name, master) {
                continue;
            }
            let info = infos.get(name.as_str()).copied();
            let entry = self.channel(info, ChannelData::row_index(rows), master)?;
            outcome.insert(name.clone(), entry);
        }

        for (name, reason) in &layout.unsupported {
            if self.wants(name, master) {
                outcome.mark_unavailable(
                    name.clone(),
                    self.number,
                    UnavailableReason::Unsupported(reason.clone()),
                );
            }
        }
        Ok(())
    }

    /// Dereference VLSD offsets into values.
    ///
    /// The values come from the VLSD channel group named by the channel, or
    /// from the signal data blocks at its data address. `None` when neither
    /// exists.
    fn vlsd_values(
        &self,
        info: &ChannelInfo,
        offsets: &[u64],
        streams: &HashMap<u64, SignalStream>,
        source: &mut dyn ByteSource,
    ) -> Result<Option<ChannelData>> {
        let loaded;
        let stream = match info.vlsd_record_id {
            Some(id) => match streams.get(&id) {
                Some(stream) => stream,
                None => {
                    warn!("Channel {:?}: no VLSD rows with ID {}", info.name, id);
                    return Ok(None);
                }
            },
            None if info.data_addr != 0 => {
                let mut stream = SignalStream::new();
                resolve(source, info.data_addr, Content::SignalData, &mut stream)?;
                loaded = stream;
                &loaded
            }
            None => {
                warn!("Channel {:?}: VLSD channel without signal data", info.name);
                return Ok(None);
            }
        };

        let index = stream.index()?;
        let values = offsets
            .iter()
            .map(|&offset| {
                index
                    .get(&offset)
                    .copied()
                    .ok_or_else(|| Error::InvalidVlsdOffset {
                        channel: info.name.clone(),
                        offset,
                    })
            })
            .collect::<Result<Vec<&[u8]>>>()?;
        Ok(Some(decode_vlsd_values(info.data_type, values.into_iter())))
    }

    /// A channel entry with the conversion applied when enabled.
    fn channel(
        &self,
        info: Option<&ChannelInfo>,
        data: ChannelData,
        master: Option<&str>,
    ) -> Result<Channel> {
        let mut entry = self.raw_channel(info, data, master);
        if !self.options.convert {
            return Ok(entry);
        }
        if let Some(conv) = &entry.conversion
            && let Some(converted) = conversion::apply(conv, &entry.data, self.evaluator)?
        {
            entry.data = converted;
            entry.converted = true;
        }
        Ok(entry)
    }

    fn raw_channel(&self, info: Option<&ChannelInfo>, data: ChannelData, master: Option<&str>) -> Channel {
        let own_name = info.map(|i| i.name.as_str());
        Channel {
            data,
            master: master.filter(|&m| Some(m) != own_name).map(str::to_string),
            unit: info.and_then(|i| i.unit.clone()),
            description: info.and_then(|i| i.description.clone()),
            conversion: info.and_then(|i| i.conversion.clone()),
            converted: false,
            data_group: self.number,
        }
    }

    fn wants(&self, name: &str, master: Option<&str>) -> bool {
        master == Some(name) || self.selected.as_ref().is_none_or(|s| s.contains(name))
    }

    fn mark_group(&self, cg: &ChannelGroupInfo, outcome: &mut ReadOutcome, reason: UnavailableReason) {
        let master = cg.master().map(|m| m.name.as_str());
        for channel in cg.channels.values() {
            if self.wants(&channel.name, master) {
                outcome.mark_unavailable(channel.name.clone(), self.number, reason.clone());
            }
        }
    }
}

fn offset_values(data: &ChannelData) -> Vec<u64> {
    match data {
        ChannelData::UInt64(v) => v.clone(),
        ChannelData::UInt32(v) => v.iter().map(|&o| o as u64).collect(),
        other => other
            .as_f64()
            .unwrap_or_default()
            .into_iter()
            .map(|o| o as u64)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blocks::{DataType, ExpressionEvaluator},
        info::{ConversionInfo, channel_type},
        parsing::MemorySource,
    };

    fn block(id: &[u8; 4], links: &[u64], payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(id);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&((24 + links.len() * 8 + payload.len()) as u64).to_le_bytes());
        bytes.extend_from_slice(&(links.len() as u64).to_le_bytes());
        for l in links {
            bytes.extend_from_slice(&l.to_le_bytes());
        }
        bytes.extend_from_slice(payload);
        bytes
    }

    fn channel(name: &str, kind: u8, data_type: DataType, byte_offset: u32, bits: u32) -> ChannelInfo {
        ChannelInfo {
            name: name.into(),
            channel_type: kind,
            data_type,
            byte_offset,
            bit_count: bits,
            ..Default::default()
        }
    }

    fn group(record_id: u64, data_bytes: u32, channels: Vec<ChannelInfo>) -> ChannelGroupInfo {
        ChannelGroupInfo {
            record_id,
            data_bytes,
            channels: channels.into_iter().enumerate().map(|(i, c)| (i as u32, c)).collect(),
            ..Default::default()
        }
    }

    fn sorted_group() -> DataGroupInfo {
        let mut speed = channel("speed", channel_type::FIXED_LENGTH, DataType::UnsignedIntegerLE, 2, 16);
        speed.conversion = Some(ConversionInfo {
            conversion_type: crate::blocks::ConversionType::Linear,
            values: vec![0.0, 0.5],
            ..Default::default()
        });
        DataGroupInfo {
            data_block_addr: 8,
            channel_groups: [(
                0,
                group(
                    0,
                    4,
                    vec![
                        channel("t", channel_type::MASTER, DataType::UnsignedIntegerLE, 0, 16),
                        speed,
                        channel("idx", channel_type::VIRTUAL_DATA, DataType::UnsignedIntegerLE, 0, 0),
                    ],
                ),
            )]
            .into(),
            ..Default::default()
        }
    }

    fn sorted_image() -> MemorySource {
        let mut payload = Vec::new();
        for (t, s) in [(1u16, 10u16), (2, 20), (3, 30)] {
            payload.extend_from_slice(&t.to_le_bytes());
            payload.extend_from_slice(&s.to_le_bytes());
        }
        let mut image = vec![0u8; 8];
        image.extend(block(b"##DT", &[], &payload));
        MemorySource::new(image)
    }

    #[test]
    fn sorted_group_decodes_converts_and_synthesizes_virtual() {
        let info = sorted_group();
        let options = ReadOptions::default();
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        assert_eq!(reader.state(), GroupState::Sorted);
        let outcome = reader.read(&mut sorted_image()).unwrap();

        let speed = outcome.get("speed").unwrap();
        assert_eq!(speed.data, ChannelData::Float64(vec![5.0, 10.0, 15.0]));
        assert!(speed.converted);
        assert_eq!(speed.master.as_deref(), Some("t"));
        assert_eq!(outcome.get("t").unwrap().master, None);
        assert_eq!(outcome.get("idx").unwrap().data, ChannelData::UInt64(vec![0, 1, 2]));
    }

    #[test]
    fn allow_list_projects_and_keeps_master() {
        let info = sorted_group();
        let options = ReadOptions::default()
            .with_convert(false)
            .with_channels(["speed"])
            .with_chunk_size(3);
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        let outcome = reader.read(&mut sorted_image()).unwrap();

        assert_eq!(outcome.channels.len(), 2);
        assert_eq!(outcome.get("speed").unwrap().data, ChannelData::UInt16(vec![10, 20, 30]));
        assert_eq!(outcome.get("t").unwrap().data, ChannelData::UInt16(vec![1, 2, 3]));
        assert!(outcome.get("speed").unwrap().conversion.is_some());
    }

    #[test]
    fn allow_list_of_virtual_master_keeps_row_count() {
        let info = DataGroupInfo {
            data_block_addr: 8,
            channel_groups: [(
                0,
                group(
                    0,
                    1,
                    vec![
                        channel("t", channel_type::VIRTUAL_MASTER, DataType::UnsignedIntegerLE, 0, 0),
                        channel("v", channel_type::FIXED_LENGTH, DataType::UnsignedIntegerLE, 0, 8),
                    ],
                ),
            )]
            .into(),
            ..Default::default()
        };
        let mut image = vec![0u8; 8];
        image.extend(block(b"##DT", &[], &[4, 5, 6]));
        let mut src = MemorySource::new(image);

        let options = ReadOptions::default().with_channels(["t"]);
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        let outcome = reader.read(&mut src).unwrap();
        assert_eq!(outcome.get("t").unwrap().data, ChannelData::UInt64(vec![0, 1, 2]));
        assert!(outcome.get("v").is_none());
        assert!(outcome.unavailable.is_empty());

        let unfiltered = ReadOptions::default();
        let reader = DataGroupReader::new(0, &info, &unfiltered, &ExpressionEvaluator);
        let outcome = reader.read(&mut src).unwrap();
        assert_eq!(outcome.get("t").unwrap().data, ChannelData::UInt64(vec![0, 1, 2]));
        assert_eq!(outcome.get("v").unwrap().data, ChannelData::UInt8(vec![4, 5, 6]));
    }

    #[test]
    fn empty_group_reports_no_data() {
        let mut info = sorted_group();
        info.data_block_addr = 0;
        let options = ReadOptions::default();
        let reader = DataGroupReader::new(4, &info, &options, &ExpressionEvaluator);
        let outcome = reader.read(&mut MemorySource::new(Vec::new())).unwrap();
        assert!(outcome.channels.is_empty());
        assert_eq!(outcome.unavailable["speed"].data_group, 4);
        assert_eq!(outcome.unavailable["speed"].reason, UnavailableReason::NoData);
    }

    #[test]
    fn sorted_group_with_two_channel_groups_is_invalid() {
        let mut info = sorted_group();
        info.channel_groups.insert(1, group(1, 1, Vec::new()));
        let options = ReadOptions::default();
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        assert!(matches!(
            reader.read(&mut sorted_image()),
            Err(Error::InvalidLayout(_))
        ));
    }

    /// Record 1: u8 value + u64 VLSD offset; record 2: VLSD rows.
    fn unsorted_vlsd_group() -> (DataGroupInfo, MemorySource) {
        let mut text = channel("msg", channel_type::VLSD, DataType::StringUtf8, 1, 64);
        text.vlsd_record_id = Some(2);
        let fixed = group(
            1,
            9,
            vec![channel("v", channel_type::FIXED_LENGTH, DataType::UnsignedIntegerLE, 0, 8), text],
        );
        let mut vlsd = group(2, 0, Vec::new());
        vlsd.flags = 1;

        let mut payload = Vec::new();
        payload.push(2u8);
        payload.extend_from_slice(&2u32.to_le_bytes());
        payload.extend_from_slice(b"hi");
        payload.push(1u8);
        payload.push(7);
        payload.extend_from_slice(&0u64.to_le_bytes());
        payload.push(2u8);
        payload.extend_from_slice(&3u32.to_le_bytes());
        payload.extend_from_slice(b"you");
        payload.push(1u8);
        payload.push(8);
        payload.extend_from_slice(&6u64.to_le_bytes());

        let info = DataGroupInfo {
            data_block_addr: 16,
            record_id_size: 1,
            channel_groups: [(0, fixed), (1, vlsd)].into(),
            ..Default::default()
        };
        let mut image = vec![0u8; 16];
        image.extend(block(b"##DT", &[], &payload));
        (info, MemorySource::new(image))
    }

    #[test]
    fn unsorted_group_with_vlsd_channel_group() {
        let (info, mut src) = unsorted_vlsd_group();
        let options = ReadOptions::default();
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        assert_eq!(reader.state(), GroupState::Unsorted);
        let outcome = reader.read(&mut src).unwrap();
        assert_eq!(outcome.get("v").unwrap().data, ChannelData::UInt8(vec![7, 8]));
        assert_eq!(
            outcome.get("msg").unwrap().data,
            ChannelData::Strings(vec!["hi".into(), "you".into()])
        );
        assert_eq!(
            outcome.get("msg_offset").unwrap().data,
            ChannelData::UInt64(vec![0, 6])
        );
    }

    #[test]
    fn derived_name_selects_its_source_channel() {
        let (info, mut src) = unsorted_vlsd_group();
        let options = ReadOptions::default().with_channels(["msg_offset"]);
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        assert!(reader.is_wanted());
        let outcome = reader.read(&mut src).unwrap();
        assert_eq!(
            outcome.get("msg_offset").unwrap().data,
            ChannelData::UInt64(vec![0, 6])
        );
        assert!(outcome.get("msg").is_some());
        assert!(outcome.get("v").is_none());

        let options = ReadOptions::default().with_channels(["nothing_offset"]);
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        assert!(!reader.is_wanted());
    }

    #[test]
    fn bad_vlsd_offset_is_an_error() {
        let mut text = channel("msg", channel_type::VLSD, DataType::StringLatin1, 0, 64);
        text.data_addr = 8;
        let info = DataGroupInfo {
            data_block_addr: 8 + 24 + 7,
            channel_groups: [(0, group(0, 8, vec![text]))].into(),
            ..Default::default()
        };
        let mut image = vec![0u8; 8];
        let mut sd = 3u32.to_le_bytes().to_vec();
        sd.extend_from_slice(b"abc");
        image.extend(block(b"##SD", &[], &sd));
        image.extend(block(b"##DT", &[], &5u64.to_le_bytes()));

        let options = ReadOptions::default();
        let reader = DataGroupReader::new(0, &info, &options, &ExpressionEvaluator);
        assert!(matches!(
            reader.read(&mut MemorySource::new(image)),
            Err(Error::InvalidVlsdOffset { offset: 5, .. })
        ));
    }
}
