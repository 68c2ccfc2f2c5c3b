//! Error types for MDF4 decoding.
//!
//! This module defines the [`Error`] enum which represents every failure that
//! aborts a read. Soft failures (a data group without data, a channel whose
//! encoding cannot be represented) are not errors: they are reported through
//! [`crate::Unavailable`] entries of the read outcome.
//!
//! # Example
//!
//! ```no_run
//! use mdf4_reader::{Error, MdfInfo, ReadOptions, Result, read_file};
//!
//! fn decode(path: &str, info: &MdfInfo) -> Result<()> {
//!     match read_file(path, info, &ReadOptions::default()) {
//!         Ok(outcome) => {
//!             println!("Decoded {} channels", outcome.channels.len());
//!             Ok(())
//!         }
//!         Err(Error::EmptyDataList { address }) => {
//!             eprintln!("Corrupt data list at {address:#x}");
//!             Err(Error::EmptyDataList { address })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use crate::blocks::ConversionType;
use thiserror::Error;

/// Errors that abort an MDF read.
#[derive(Debug, Error)]
pub enum Error {
    /// Buffer provided for parsing was too small.
    ///
    /// This typically indicates file corruption or an incomplete read.
    #[error("Buffer too small at {file}:{line}: need at least {expected} bytes, got {actual}")]
    TooShortBuffer {
        /// Actual number of bytes available
        actual: usize,
        /// Minimum number of bytes required
        expected: usize,
        /// Source file where the error was detected
        file: &'static str,
        /// Line number where the error was detected
        line: u32,
    },

    /// A block identifier did not match the expected value.
    #[error("Invalid block identifier: Expected {expected:?}, got {actual:?}")]
    BlockIDError {
        /// The identifier that was found
        actual: String,
        /// The identifier that was expected
        expected: String,
    },

    /// A field read went past the length declared in the block header.
    #[error("Read past end of {id} block: requested {requested} bytes, {remaining} remaining")]
    BlockOverrun {
        id: String,
        requested: usize,
        remaining: usize,
    },

    /// An I/O error occurred while reading the file.
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    /// A data list block declared zero data blocks.
    #[error("Data list block at {address:#x} references no data blocks")]
    EmptyDataList { address: u64 },

    /// The zlib stream of a DZ block could not be inflated.
    #[error("DZ decompression failed: {0}")]
    DecompressionError(String),

    /// A DZ block was found but the crate was built without `compression`.
    #[error("DZ block found but compression support is disabled")]
    CompressionUnavailable,

    /// The zip type of a DZ or HL block is not defined by MDF 4.
    #[error("Unknown zip type {0}")]
    UnknownZipType(u8),

    /// A value-to-value table does not have strictly increasing keys.
    #[error("{conversion:?} conversion table keys are not strictly increasing")]
    NonMonotonicTable { conversion: ConversionType },

    /// A record ID in unsorted data does not belong to any channel group.
    #[error("Unknown record ID {record_id} at byte {position} of unsorted data")]
    UnknownRecordId { record_id: u64, position: usize },

    /// A channel's data type and bit count have no storage representation.
    #[error("Channel {channel:?}: unsupported data type {data_type} with {bit_count} bits")]
    UnsupportedDataType {
        channel: String,
        data_type: u8,
        bit_count: u32,
    },

    /// The channel descriptors do not fit the declared record layout.
    #[error("Invalid record layout: {0}")]
    InvalidLayout(String),

    /// A VLSD record offset does not point at a value in the signal data.
    #[error("Channel {channel:?}: no signal data value at offset {offset}")]
    InvalidVlsdOffset { channel: String, offset: u64 },

    /// An algebraic conversion formula could not be parsed or evaluated.
    #[error("Formula {formula:?}: {reason}")]
    FormulaError { formula: String, reason: String },

    /// The requested data group is not described by the metadata.
    #[error("Data group {0} is not described by the metadata")]
    UnknownDataGroup(u32),

    /// The metadata description could not be loaded.
    #[cfg(feature = "serde")]
    #[error("Invalid metadata description: {0}")]
    InvalidInfo(#[from] serde_json::Error),
}

/// A specialized Result type for MDF operations.
///
/// This is defined as `core::result::Result<T, Error>` for convenience.
pub type Result<T> = core::result::Result<T, Error>;
