use crate::{
    Error, Result,
    blocks::{ExpressionEvaluator, FormulaEvaluator},
    channel::ReadOutcome,
    info::MdfInfo,
    parsing::{ByteSource, DataGroupReader, FileRangeReader, MemorySource},
};
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Read granularity of the per-record path.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Options of a read.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReadOptions {
    /// Apply physical conversions.
    pub convert: bool,
    /// Channel allow-list. Master channels are always read.
    ///
    /// A derived name such as `<name>_offset` of a VLSD channel or a CANopen
    /// sub-field like `<name>_ms` selects its source channel, which then
    /// yields all of its outputs.
    pub channels: Option<BTreeSet<String>>,
    /// Decode data groups concurrently when built with `parallel` on unix.
    pub parallel: bool,
    pub chunk_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            convert: true,
            channels: None,
            parallel: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ReadOptions {
    pub fn with_convert(mut self, convert: bool) -> Self {
        self.convert = convert;
        self
    }

    pub fn with_channels<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.channels = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// The allow-list admits `name`.
    pub fn wants(&self, name: &str) -> bool {
        self.channels
            .as_ref()
            .is_none_or(|names| names.contains(name))
    }
}

/// An MDF4 file paired with the description of its data groups.
///
/// The description comes from a metadata provider; this type only decodes
/// the data blocks it points at.
///
/// # Example
///
/// ```no_run
/// use mdf4_reader::{MDF, MdfInfo, ReadOptions, Result};
///
/// fn main() -> Result<()> {
///     let info = MdfInfo::from_json_file("recording.json")?;
///     let mut mdf = MDF::open("recording.mf4", info)?;
///     let outcome = mdf.read(&ReadOptions::default().with_channels(["Speed"]))?;
///     if let Some(speed) = outcome.get("Speed") {
///         println!("{} samples against {:?}", speed.len(), speed.master);
///     }
///     Ok(())
/// }
/// ```
pub struct MDF<S = FileRangeReader> {
    source: S,
    info: MdfInfo,
    evaluator: Arc<dyn FormulaEvaluator>,
}

impl MDF<FileRangeReader> {
    pub fn open(path: impl AsRef<Path>, info: MdfInfo) -> Result<Self> {
        Ok(Self::new(FileRangeReader::new(path)?, info))
    }
}

impl MDF<MemorySource> {
    /// Decode an MDF image already held in memory.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, info: MdfInfo) -> Self {
        Self::new(MemorySource::new(bytes), info)
    }
}

impl<S: ByteSource + Send + Sync> MDF<S> {
    pub fn new(source: S, info: MdfInfo) -> Self {
        Self {
            source,
            info,
            evaluator: Arc::new(ExpressionEvaluator),
        }
    }

    /// Replace the evaluator used for algebraic conversions.
    pub fn with_evaluator(mut self, evaluator: impl FormulaEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn info(&self) -> &MdfInfo {
        &self.info
    }

    /// Read every data group.
    pub fn read(&mut self, options: &ReadOptions) -> Result<ReadOutcome> {
        read_groups(&mut self.source, &self.info, self.evaluator.as_ref(), options)
    }

    /// Read one data group.
    pub fn read_data_group(&mut self, number: u32, options: &ReadOptions) -> Result<ReadOutcome> {
        read_group(
            &mut self.source,
            &self.info,
            self.evaluator.as_ref(),
            number,
            options,
        )
    }
}

/// Read every data group of the file at `path`.
///
/// The file is opened once and closed when the read ends, whether it
/// succeeded or not.
pub fn read_file(path: impl AsRef<Path>, info: &MdfInfo, options: &ReadOptions) -> Result<ReadOutcome> {
    let mut source = FileRangeReader::new(path)?;
    read_groups(&mut source, info, &ExpressionEvaluator, options)
}

fn read_group(
    source: &mut dyn ByteSource,
    info: &MdfInfo,
    evaluator: &dyn FormulaEvaluator,
    number: u32,
    options: &ReadOptions,
) -> Result<ReadOutcome> {
    let group = info
        .data_group(number)
        .ok_or(Error::UnknownDataGroup(number))?;
    let reader = DataGroupReader::new(number, group, options, evaluator);
    if !reader.is_wanted() {
        debug!("Data group {number}: no requested channel");
        return Ok(ReadOutcome::default());
    }
    reader.read(source)
}

fn read_groups<S: ByteSource + Send + Sync>(
    source: &mut S,
    info: &MdfInfo,
    evaluator: &dyn FormulaEvaluator,
    options: &ReadOptions,
) -> Result<ReadOutcome> {
    let numbers: Vec<u32> = info.data_groups.keys().copied().collect();

    let outcomes = if options.parallel && numbers.len() > 1 {
        read_concurrently(source, info, evaluator, &numbers, options)?
    } else {
        numbers
            .iter()
            .map(|&n| read_group(&mut *source, info, evaluator, n, options))
            .collect::<Result<Vec<_>>>()?
    };

    let mut outcome = ReadOutcome::default();
    for group in outcomes {
        outcome.merge(group);
    }
    info!(
        "Read {} data groups: {} channels, {} unavailable",
        numbers.len(),
        outcome.channels.len(),
        outcome.unavailable.len()
    );
    Ok(outcome)
}

/// One worker per data group, each on its own handle. Outcomes keep the data
/// group order; the first error wins.
#[cfg(all(feature = "parallel", unix))]
fn read_concurrently<S: ByteSource + Send + Sync>(
    source: &mut S,
    info: &MdfInfo,
    evaluator: &dyn FormulaEvaluator,
    numbers: &[u32],
    options: &ReadOptions,
) -> Result<Vec<ReadOutcome>> {
    use rayon::prelude::*;

    let shared: &S = source;
    let results: Vec<Result<ReadOutcome>> = numbers
        .par_iter()
        .map(|&n| {
            let mut handle = shared.reopen()?;
            read_group(&mut handle, info, evaluator, n, options)
        })
        .collect();

    let mut out = Vec::with_capacity(results.len());
    for r in results {
        out.push(r?);
    }
    Ok(out)
}

#[cfg(not(all(feature = "parallel", unix)))]
fn read_concurrently<S: ByteSource + Send + Sync>(
    source: &mut S,
    info: &MdfInfo,
    evaluator: &dyn FormulaEvaluator,
    numbers: &[u32],
    options: &ReadOptions,
) -> Result<Vec<ReadOutcome>> {
    debug!("Concurrent reads unavailable, decoding data groups in turn");
    numbers
        .iter()
        .map(|&n| read_group(&mut *source, info, evaluator, n, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blocks::DataType,
        info::{ChannelGroupInfo, ChannelInfo, DataGroupInfo, channel_type},
        types::ChannelData,
    };

    fn image() -> (Vec<u8>, MdfInfo) {
        let mut bytes = vec![0u8; 8];
        bytes.extend_from_slice(b"##DT");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&27u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&[4, 5, 6]);

        let group = ChannelGroupInfo {
            data_bytes: 1,
            channels: [(
                0,
                ChannelInfo {
                    name: "counter".into(),
                    channel_type: channel_type::FIXED_LENGTH,
                    data_type: DataType::UnsignedIntegerLE,
                    bit_count: 8,
                    ..Default::default()
                },
            )]
            .into(),
            ..Default::default()
        };
        let mut info = MdfInfo::new();
        info.data_groups.insert(
            0,
            DataGroupInfo {
                data_block_addr: 8,
                channel_groups: [(0, group)].into(),
                ..Default::default()
            },
        );
        info.data_groups.insert(1, DataGroupInfo::default());
        (bytes, info)
    }

    #[test]
    fn default_options() {
        let options = ReadOptions::default();
        assert!(options.convert);
        assert!(!options.parallel);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(options.wants("anything"));
        assert!(!options.with_channels(["a"]).wants("b"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn options_from_partial_json() {
        let options: ReadOptions =
            serde_json::from_str(r#"{"channels": ["Speed"], "convert": false}"#).unwrap();
        assert!(!options.convert);
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(options.wants("Speed"));
    }

    #[test]
    fn reads_groups_from_memory() {
        let (bytes, info) = image();
        let mut mdf = MDF::from_bytes(bytes, info);
        let outcome = mdf.read(&ReadOptions::default()).unwrap();
        assert_eq!(outcome.get("counter").unwrap().data, ChannelData::UInt8(vec![4, 5, 6]));

        let single = mdf.read_data_group(0, &ReadOptions::default()).unwrap();
        assert_eq!(single.channels.len(), 1);
        assert!(matches!(
            mdf.read_data_group(9, &ReadOptions::default()),
            Err(Error::UnknownDataGroup(9))
        ));
    }

    #[test]
    fn parallel_read_matches_sequential() {
        let (bytes, info) = image();
        let mut mdf = MDF::from_bytes(bytes, info);
        let sequential = mdf.read(&ReadOptions::default()).unwrap();
        let parallel = mdf.read(&ReadOptions::default().with_parallel(true)).unwrap();
        assert_eq!(sequential, parallel);
    }
}
