//! Input checks run before a conversion

use crate::data_source::DataReader;
use crate::errors::{CasperError, Result};
use crate::export::DEFAULT_CHUNK_SIZE;
use crate::netcdf_io::NetCDFSource;
use log::{Level, Log, Record};
use std::fmt;
use std::ops::Range;
use std::panic::Location;
use std::path::{Path, PathBuf};

/// Extensions accepted as dataset files (compared case-insensitively)
pub const VALID_EXTENSIONS: [&str; 4] = [".h5", ".nc", ".nc4", ".netcdf"];

/// Resolves `path` and checks that it names a single file with a dataset extension
pub fn valid_input_file(path: &Path) -> Result<PathBuf> {
    let invalid = |reason: &str| CasperError::InvalidInput {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("no input file provided"));
    }
    if path.is_dir() {
        return Err(invalid("input must be a single filename"));
    }
    if !path.is_file() {
        return Err(invalid("not a valid file"));
    }

    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    if !VALID_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid("input file must be a netcdf file"));
    }

    path.canonicalize().map_err(|e| invalid(&e.to_string()))
}

/// Archive file name for an input: `<name up to the first '.'>.zip`
pub fn archive_name(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = name.split('.').next().unwrap_or_default();
    format!("{}.zip", base)
}

/// True when `path` opens as a dataset holding at least one present value
pub fn valid_workable_file(path: &Path, logger: &dyn Log) -> bool {
    let source = match NetCDFSource::open(path) {
        Ok(source) => source,
        Err(e) => {
            debug(logger, format_args!("Error opening {} as netCDF: {}", path.display(), e));
            return false;
        }
    };

    match dataset_is_empty(&source) {
        Ok(false) => {
            debug(logger, format_args!("File is valid and non-empty: {}", path.display()));
            true
        }
        Ok(true) => {
            debug(logger, format_args!("File is empty: {}", path.display()));
            false
        }
        Err(e) => {
            debug(logger, format_args!("Error reading {}: {}", path.display(), e));
            false
        }
    }
}

/// Debug record located at the caller
#[track_caller]
fn debug(logger: &dyn Log, args: fmt::Arguments<'_>) {
    let location = Location::caller();
    logger.log(
        &Record::builder()
            .args(args)
            .level(Level::Debug)
            .target(module_path!())
            .module_path_static(Some(module_path!()))
            .file_static(Some(location.file()))
            .line(Some(location.line()))
            .build(),
    );
}

/// True when every variable of every group is zero-sized or entirely missing.
///
/// Variables are read in windows along their first dimension.
pub fn dataset_is_empty<R: DataReader>(reader: &R) -> Result<bool> {
    for var in reader.tree().variables() {
        if var.is_empty() {
            continue;
        }
        if var.shape.is_empty() {
            if reader.read_all(var)?.iter().any(|c| !c.is_missing()) {
                return Ok(false);
            }
            continue;
        }

        let primary = var.shape[0];
        for start in (0..primary).step_by(DEFAULT_CHUNK_SIZE) {
            let end = (start + DEFAULT_CHUNK_SIZE).min(primary);
            let ranges: Vec<Range<usize>> = std::iter::once(start..end)
                .chain(var.shape[1..].iter().map(|&len| 0..len))
                .collect();
            if reader
                .read_slice(var, &ranges)?
                .iter()
                .any(|c| !c.is_missing())
            {
                return Ok(false);
            }
        }
    }
    Ok(true)
}
