//! Centralized error handling for casper
//!
//! Every stage of a conversion reports failures through [`CasperError`]. The
//! variants follow the stages of the pipeline so a caller can tell a bad input
//! apart from a broken archive without parsing messages.

use std::fmt;

/// Main error type for casper operations
#[derive(Debug)]
pub enum CasperError {
    /// Input path rejected before conversion starts
    InvalidInput { path: String, reason: String },

    /// File cannot be opened as a NetCDF/HDF5 dataset
    UnreadableDataset { path: String, message: String },

    /// Dataset tree cannot be traversed or classified
    Schema(String),

    /// Failure while materializing or streaming one export group
    Export {
        entry: String,
        source: Box<CasperError>,
    },

    /// Failure opening, writing or closing the output archive
    Archive {
        context: String,
        source: std::io::Error,
    },

    /// NetCDF library errors
    NetCDFError(netcdf::Error),

    /// Readme.json rendering errors
    Json(serde_json::Error),

    /// Service adapter errors (fetching, staging, task join)
    Service(String),

    /// Rayon pool setup errors
    ThreadPoolError(String),
}

impl CasperError {
    /// Wraps an error raised while producing one archive entry
    pub fn export(entry: impl Into<String>, source: CasperError) -> Self {
        CasperError::Export {
            entry: entry.into(),
            source: Box::new(source),
        }
    }

    /// Wraps an I/O failure of the archive with a short description of the step
    pub fn archive(context: impl Into<String>, source: impl Into<std::io::Error>) -> Self {
        CasperError::Archive {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Returns true for errors caused by the archive rather than the dataset
    pub fn is_archive_error(&self) -> bool {
        match self {
            CasperError::Archive { .. } => true,
            CasperError::Export { source, .. } => source.is_archive_error(),
            _ => false,
        }
    }
}

impl fmt::Display for CasperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CasperError::InvalidInput { path, reason } => {
                write!(f, "Invalid input '{}': {}", path, reason)
            }
            CasperError::UnreadableDataset { path, message } => {
                write!(f, "Unable to open '{}' as a dataset: {}", path, message)
            }
            CasperError::Schema(msg) => write!(f, "Schema error: {}", msg),
            CasperError::Export { entry, source } => {
                write!(f, "Export of '{}' failed: {}", entry, source)
            }
            CasperError::Archive { context, source } => {
                write!(f, "Archive error while {}: {}", context, source)
            }
            CasperError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            CasperError::Json(e) => write!(f, "JSON error: {}", e),
            CasperError::Service(msg) => write!(f, "Service error: {}", msg),
            CasperError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
        }
    }
}

impl std::error::Error for CasperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CasperError::Export { source, .. } => Some(source.as_ref()),
            CasperError::Archive { source, .. } => Some(source),
            CasperError::NetCDFError(e) => Some(e),
            CasperError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for CasperError {
    fn from(error: netcdf::Error) -> Self {
        CasperError::NetCDFError(error)
    }
}

impl From<serde_json::Error> for CasperError {
    fn from(error: serde_json::Error) -> Self {
        CasperError::Json(error)
    }
}

impl From<ndarray::ShapeError> for CasperError {
    fn from(error: ndarray::ShapeError) -> Self {
        CasperError::Schema(format!("array shape mismatch: {}", error))
    }
}

/// Result type alias for casper operations
pub type Result<T> = std::result::Result<T, CasperError>;
