// src/blocks/mod.rs
//! On-disk data blocks and the conversion layer.
//!
//! Only the blocks that carry sample data are parsed here: `##DT`/`##RD`
//! (plain records), `##SD` (variable-length values), `##DZ` (compressed),
//! `##DL` (data list) and `##HL` (header list). Metadata blocks are
//! described by [`crate::MdfInfo`] instead.

mod common;
pub mod conversion;
mod cursor;
mod data_block;
mod data_list_block;
mod dz_block;
mod header_list_block;
mod signal_data_block;

// Re-export common types
pub use common::{BLOCK_HEADER_SIZE, BlockHeader, BlockParse, DataType};
pub(crate) use common::read_uint_le;
pub use cursor::{BlockCursor, load_block, load_header};

// Re-export block types
pub use data_block::DataBlock;
pub use data_list_block::DataListBlock;
pub use dz_block::{DzBlock, ZipType, inverse_transpose, transpose};
pub use header_list_block::HeaderListBlock;
pub use signal_data_block::{SignalDataBlock, signal_values};

// Re-export conversion types
pub use conversion::{ConversionType, ExpressionEvaluator, FormulaEvaluator};
