//! Record decoding: byte sources, record layouts, block trees and data
//! groups.

pub mod block_decoder;
pub mod decoder;
pub mod demux;
mod raw_channel;
mod raw_channel_group;
mod raw_data_group;
mod source;

pub use block_decoder::{Content, ProjectingSink, RawBlock, RecordSink, SignalStream, resolve};
pub use decoder::{RecordBuffer, decode_text, decode_vlsd_values, extract_bits, extract_channel};
pub use demux::{Demultiplexer, GroupRows};
pub use raw_channel::{ChannelKind, RecordChannel, StorageFormat, TextEncoding};
pub use raw_channel_group::{PhysicalField, Projection, RecordLayout};
pub use raw_data_group::{DataGroupReader, GroupState};
pub use source::{ByteSource, FileRangeReader, MemorySource};
