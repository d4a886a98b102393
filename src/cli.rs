//! Command-line options for the casper binary.

use casper::file_ops::archive_name;
use clap::Parser;
use std::path::PathBuf;

/// Converts a NetCDF/HDF5 file into CSV files grouped by dimension schema, packaged in a zip archive
#[derive(Parser, Debug)]
#[command(name = "casper", version, about)]
pub struct Args {
    /// Path to the NetCDF/HDF5 file (.nc, .nc4, .netcdf, .h5)
    pub input: PathBuf,

    /// Path of the zip archive to write. Defaults to <input name>.zip in the current directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of threads used to render CSV rows. Defaults to Rayon's pool size.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Enable debug logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Archive path, derived from the input name when not given
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => PathBuf::from(archive_name(&self.input)),
        }
    }
}
