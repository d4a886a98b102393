//! Export of schema groups as CSV tables
//!
//! This module is organized into submodules:
//! - [`materialize`]: outer join of a schema group into a [`GroupView`]
//! - [`stream`]: windowed CSV writing of a view
//! - [`format`]: stable text rendering of values

pub mod format;
pub mod materialize;
pub mod stream;

pub use format::{format_attribute, format_cell};
pub use materialize::{materialize, Axis, GroupView, TableChunk};
pub use stream::{CsvStreamer, StreamStats, DEFAULT_CHUNK_SIZE};
