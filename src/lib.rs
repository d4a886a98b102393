//! casper: NetCDF/HDF5 datasets as CSV files, one per dimension schema
//!
//! Every data variable of a hierarchical dataset is keyed by its ordered tuple
//! of dimension names. Variables sharing a tuple are outer-joined on their
//! coordinates and written as one CSV file. The CSV files, a `Readme.md` and a
//! `Readme.json` describing them end up in a single zip archive.
//!
//! ## Module Organization
//!
//! - [`dataset`]: group tree, variables, attributes and cell values
//! - [`data_source`]: the [`DataReader`](data_source::DataReader) trait and an in-memory dataset
//! - [`netcdf_io`]: NetCDF/HDF5 files as a `DataReader`
//! - [`conventions`]: CF fill values, packing and time decoding
//! - [`schema`]: classification of variables by dimension signature
//! - [`export`]: outer join and windowed CSV streaming of one group
//! - [`metadata`]: readme documents
//! - [`archive`]: zip output
//! - [`convert`]: the conversion pipeline
//! - [`file_ops`]: input checks
//! - [`parallel`]: Rayon pool configuration
//! - [`service`]: fetch → convert → stage adapter
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! let count = casper::convert(Path::new("granule.nc4"), Path::new("granule.zip")).unwrap();
//! println!("{} CSV files written", count);
//! ```

pub mod archive;
pub mod conventions;
pub mod convert;
pub mod data_source;
pub mod dataset;
pub mod errors;
pub mod export;
pub mod file_ops;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod schema;
pub mod service;

pub use convert::{convert, convert_with_logger, ConversionState, Converter};
pub use errors::{CasperError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::data_source::{DataReader, MemoryDataset};
    pub use crate::dataset::{ArrayVariable, AttrValue, Cell, DatasetTree, GroupNode};
    pub use crate::errors::{CasperError, Result};
    pub use crate::export::{materialize, CsvStreamer, GroupView};
    pub use crate::metadata::{GroupSummary, MetadataRecord};
    pub use crate::netcdf_io::NetCDFSource;
    pub use crate::parallel::ParallelConfig;
    pub use crate::schema::{classify, SchemaGroup, Signature};
    pub use crate::{convert, convert_with_logger, Converter};
}
