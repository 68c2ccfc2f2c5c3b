#![forbid(unsafe_code)]

//! # mdf4-reader
//!
//! Decoding engine for the sample data of ASAM MDF 4 (Measurement Data
//! Format) files.
//!
//! MDF4 is a binary file format standardized by ASAM for storing measurement
//! data, commonly used in automotive and industrial test benches. A file
//! describes its signals through metadata blocks and stores the samples in
//! data blocks. This crate reads the data blocks: the metadata is supplied
//! by the caller as an [`MdfInfo`] description, typically loaded from JSON.
//!
//! ## Features
//!
//! - **Block trees**: plain (`##DT`/`##RD`), signal data (`##SD`),
//!   compressed (`##DZ`, with or without transposition), data lists
//!   (`##DL`) and header lists (`##HL`)
//! - **Sorted and unsorted data groups**, including VLSD channel groups
//! - **Record layouts** with packed bit fields, big-endian types, text
//!   encodings and the CANopen date/time composites
//! - **Conversions**: linear, rational, algebraic, table lookups and text
//!   tables
//! - **Channel filtering** that only keeps the requested record bytes
//! - **Parallel decoding** of data groups with the `parallel` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use mdf4_reader::{MdfInfo, ReadOptions, Result, read_file};
//!
//! fn main() -> Result<()> {
//!     let info = MdfInfo::from_json_file("recording.json")?;
//!     let outcome = read_file("recording.mf4", &info, &ReadOptions::default())?;
//!
//!     for (name, channel) in &outcome.channels {
//!         println!("{name}: {} samples, unit {:?}", channel.len(), channel.unit);
//!     }
//!     for (name, missing) in &outcome.unavailable {
//!         println!("{name}: not decoded ({:?})", missing.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`blocks`] | Data block structures and the conversion layer |
//! | [`parsing`] | Byte sources, record layouts, block trees and data groups |
//! | [`info`] | Metadata description consumed by the reader |
//! | [`error`] | Error types and [`Result`] alias |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], which is an alias for
//! `std::result::Result<T, Error>`. A data group without data or a channel
//! whose encoding cannot be represented does not fail the read; it shows up
//! in [`ReadOutcome::unavailable`].

pub mod blocks;
pub mod parsing;

mod channel;
mod mdf;
mod types;

pub mod error;
pub mod info;

// Re-export commonly used types at the crate root
pub use blocks::{ConversionType, DataType, ExpressionEvaluator, FormulaEvaluator};
pub use channel::{Channel, ReadOutcome, Unavailable, UnavailableReason};
pub use error::{Error, Result};
pub use info::{ChannelGroupInfo, ChannelInfo, ConversionInfo, DataGroupInfo, MdfInfo};
pub use mdf::{DEFAULT_CHUNK_SIZE, MDF, ReadOptions, read_file};
pub use parsing::{ByteSource, FileRangeReader, MemorySource};
pub use types::ChannelData;
