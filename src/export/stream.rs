//! Chunked CSV streaming
//!
//! A view is written along its primary axis in fixed windows so that only one
//! window of rows is held in memory. The header goes out with the first window
//! only; rows whose data variables are all missing are dropped.

use super::format::format_cell;
use super::materialize::GroupView;
use crate::data_source::DataReader;
use crate::errors::{CasperError, Result};
use rayon::prelude::*;
use std::io::Write;

/// Primary-axis positions per window
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Counters describing one streamed group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub windows: usize,
    pub rows_written: usize,
    pub rows_dropped: usize,
}

/// Writes views as CSV text in bounded windows
#[derive(Debug, Clone, Copy)]
pub struct CsvStreamer {
    chunk_size: usize,
}

impl Default for CsvStreamer {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CsvStreamer {
    /// Creates a streamer; a zero chunk size is raised to one
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Window bounds partitioning `0..len`
    pub fn windows(&self, len: usize) -> impl Iterator<Item = (usize, usize)> {
        let chunk = self.chunk_size;
        (0..len)
            .step_by(chunk)
            .map(move |start| (start, (start + chunk).min(len)))
    }

    /// Streams `view` as CSV into `out`.
    ///
    /// An empty primary axis still produces the header line.
    pub fn stream<R: DataReader, W: Write>(
        &self,
        view: &GroupView<'_>,
        reader: &R,
        out: &mut W,
    ) -> Result<StreamStats> {
        let mut stats = StreamStats::default();
        let header = view.header();

        if view.primary_len() == 0 {
            write_records(&mut *out, Some(&header), &[])?;
            return Ok(stats);
        }

        for (window, (start, end)) in self.windows(view.primary_len()).enumerate() {
            let mut chunk = view.read_window(reader, start, end)?;
            stats.rows_dropped += chunk.retain_present();

            let records: Vec<Vec<String>> = chunk
                .rows
                .par_iter()
                .map(|row| row.iter().map(format_cell).collect())
                .collect();
            stats.rows_written += records.len();

            let header = if window == 0 { Some(&header) } else { None };
            write_records(&mut *out, header, &records)?;
            stats.windows += 1;
        }

        Ok(stats)
    }
}

fn write_records<W: Write>(
    out: &mut W,
    header: Option<&Vec<String>>,
    records: &[Vec<String>],
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    if let Some(header) = header {
        writer
            .write_record(header)
            .map_err(|e| CasperError::archive("writing a CSV header", e))?;
    }
    for record in records {
        writer
            .write_record(record)
            .map_err(|e| CasperError::archive("writing CSV rows", e))?;
    }
    writer
        .flush()
        .map_err(|e| CasperError::archive("flushing CSV rows", e))
}
