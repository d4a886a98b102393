//! Conversion orchestration
//!
//! classify → (materialize + stream) per group → summarize → finalize.
//! Failures are logged once here, together with the stage that was running,
//! and handed back to the caller unchanged.

use crate::archive::ArchiveWriter;
use crate::data_source::DataReader;
use crate::errors::{CasperError, Result};
use crate::export::{materialize, CsvStreamer};
use crate::metadata::{GroupSummary, MetadataRecord, README_JSON, README_MARKDOWN};
use crate::netcdf_io::NetCDFSource;
use crate::schema::{classify, SchemaGroup};
use log::{Level, Log, Record};
use std::fmt;
use std::io::{Seek, Write};
use std::panic::Location;
use std::path::Path;

/// Stage of a running conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Idle,
    Classifying,
    ExportingGroup(usize),
    Summarizing,
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionState::Idle => write!(f, "opening the dataset"),
            ConversionState::Classifying => write!(f, "classifying variables"),
            ConversionState::ExportingGroup(i) => write!(f, "exporting group {}", i),
            ConversionState::Summarizing => write!(f, "summarizing metadata"),
            ConversionState::Finalizing => write!(f, "finalizing the archive"),
            ConversionState::Done => write!(f, "done"),
            ConversionState::Failed => write!(f, "failed"),
        }
    }
}

/// Runs conversions, reporting progress to an explicit logger
pub struct Converter<'a> {
    logger: &'a dyn Log,
    streamer: CsvStreamer,
}

impl<'a> Converter<'a> {
    pub fn new(logger: &'a dyn Log) -> Self {
        Self {
            logger,
            streamer: CsvStreamer::default(),
        }
    }

    /// Overrides the number of primary-axis positions per window
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.streamer = CsvStreamer::new(chunk_size);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.streamer.chunk_size()
    }

    /// Converts an opened dataset into the archive at `output`.
    ///
    /// Returns the number of CSV entries written.
    pub fn convert_source<R: DataReader>(&self, reader: &R, output: &Path) -> Result<usize> {
        let mut state = ConversionState::Idle;
        match self.run(reader, output, &mut state) {
            Ok(count) => Ok(count),
            Err(e) => {
                self.report_failure(reader.source_name(), state, &e);
                Err(e)
            }
        }
    }

    fn run<R: DataReader>(
        &self,
        reader: &R,
        output: &Path,
        state: &mut ConversionState,
    ) -> Result<usize> {
        self.enter(state, ConversionState::Classifying);
        let groups = classify(reader.tree())?;
        let stem = file_stem(reader.source_name());

        let mut archive = ArchiveWriter::create(output)?;
        self.emit(
            Level::Info,
            format_args!(
                "Creating {} CSV files for {}",
                groups.len(),
                reader.source_name()
            ),
        );

        let mut record = MetadataRecord::new(reader.source_name());
        for (i, group) in groups.iter().enumerate() {
            self.enter(state, ConversionState::ExportingGroup(i));
            let filename = format!("{}-{}.csv", stem, i);
            let summary = self
                .export_group(reader, group, &filename, &mut archive)
                .map_err(|e| {
                    if e.is_archive_error() {
                        e
                    } else {
                        CasperError::export(filename.as_str(), e)
                    }
                })?;
            record.record_group(summary);
            self.emit(Level::Info, format_args!("{} added to zip file", filename));
        }

        self.enter(state, ConversionState::Summarizing);
        record.record_attributes(reader.tree());
        let markdown = record.render_markdown();
        let json = record.render_json()?;

        self.enter(state, ConversionState::Finalizing);
        archive.write_entry(README_MARKDOWN, markdown.as_bytes())?;
        archive.write_entry(README_JSON, json.as_bytes())?;
        archive.finish()?;

        self.enter(state, ConversionState::Done);
        self.emit(
            Level::Info,
            format_args!(
                "{} written with {} CSV files",
                output.display(),
                groups.len()
            ),
        );
        Ok(groups.len())
    }

    fn export_group<R: DataReader, W: Write + Seek>(
        &self,
        reader: &R,
        group: &SchemaGroup<'_>,
        filename: &str,
        archive: &mut ArchiveWriter<W>,
    ) -> Result<GroupSummary> {
        let view = materialize(reader, group)?;
        let mut entry = archive.entry(filename, true)?;
        let stats = self.streamer.stream(&view, reader, &mut entry)?;
        self.emit(
            Level::Debug,
            format_args!(
                "{} {}: {} rows in {} windows, {} empty rows dropped",
                filename,
                group.signature,
                stats.rows_written,
                stats.windows,
                stats.rows_dropped
            ),
        );
        Ok(GroupSummary::from_view(filename, &view))
    }

    #[track_caller]
    fn enter(&self, state: &mut ConversionState, next: ConversionState) {
        self.emit(Level::Debug, format_args!("{:?} -> {:?}", state, next));
        *state = next;
    }

    #[track_caller]
    fn report_failure(&self, input: &str, state: ConversionState, error: &CasperError) {
        self.emit(
            Level::Error,
            format_args!(
                "Conversion of {} failed while {}: {}",
                input, state, error
            ),
        );
        self.emit(
            Level::Debug,
            format_args!("{:?} -> {:?}", state, ConversionState::Failed),
        );
    }

    /// Logs one record located at the call site
    #[track_caller]
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let location = Location::caller();
        self.logger.log(
            &Record::builder()
                .args(args)
                .level(level)
                .target(module_path!())
                .module_path_static(Some(module_path!()))
                .file_static(Some(location.file()))
                .line(Some(location.line()))
                .build(),
        );
    }
}

/// Source name without its last extension
fn file_stem(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string())
}

/// Converts the dataset file at `input` into a zip archive at `output`.
///
/// Progress goes to the global `log` logger. Returns the number of CSV files
/// in the archive.
pub fn convert(input: &Path, output: &Path) -> Result<usize> {
    convert_with_logger(input, output, log::logger())
}

/// Same as [`convert`] with an explicit logger
pub fn convert_with_logger(input: &Path, output: &Path, logger: &dyn Log) -> Result<usize> {
    let converter = Converter::new(logger);
    let source = match NetCDFSource::open(input) {
        Ok(source) => source,
        Err(e) => {
            let name = input.display().to_string();
            converter.report_failure(&name, ConversionState::Idle, &e);
            return Err(e);
        }
    };
    converter.convert_source(&source, output)
}
