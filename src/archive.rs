//! Zip archive output
//!
//! Entries are deflated and stamped with a fixed timestamp and mode, so two
//! conversions of the same dataset give identical archives.

use crate::errors::{CasperError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Sequential writer of named archive entries
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    names: HashSet<String>,
}

impl ArchiveWriter<File> {
    /// Creates (or truncates) the archive file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            CasperError::archive(format!("creating '{}'", path.display()), e)
        })?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            names: HashSet::new(),
        }
    }

    fn options(large_file: bool) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
            .large_file(large_file)
    }

    /// Starts a new entry; the returned handle receives its bytes.
    ///
    /// `large_file` enables zip64 sizes for entries that may exceed 4 GiB.
    pub fn entry(&mut self, name: &str, large_file: bool) -> Result<ArchiveEntry<'_, W>> {
        if !self.names.insert(name.to_string()) {
            return Err(CasperError::archive(
                format!("adding '{}'", name),
                io::Error::new(io::ErrorKind::AlreadyExists, "duplicate archive entry"),
            ));
        }
        self.zip
            .start_file(name, Self::options(large_file))
            .map_err(|e| CasperError::archive(format!("adding '{}'", name), e))?;
        Ok(ArchiveEntry {
            zip: &mut self.zip,
            written: 0,
        })
    }

    /// Adds a complete small entry
    pub fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut entry = self.entry(name, false)?;
        entry
            .write_all(bytes)
            .map_err(|e| CasperError::archive(format!("writing '{}'", name), e))
    }

    /// Names added so far
    pub fn entry_count(&self) -> usize {
        self.names.len()
    }

    /// Writes the central directory and returns the underlying writer
    pub fn finish(self) -> Result<W> {
        self.zip
            .finish()
            .map_err(|e| CasperError::archive("finalizing the archive", e))
    }
}

/// Open entry of an [`ArchiveWriter`]
pub struct ArchiveEntry<'a, W: Write + Seek> {
    zip: &'a mut ZipWriter<W>,
    written: u64,
}

impl<W: Write + Seek> ArchiveEntry<'_, W> {
    /// Uncompressed bytes written to this entry
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write + Seek> Write for ArchiveEntry<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.zip.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.zip.flush()
    }
}
