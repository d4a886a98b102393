//! Entry point for the casper command-line tool.
//! Validates the input file, then converts it into a zip archive of CSV files.

use casper::errors::{CasperError, Result};
use casper::file_ops::{valid_input_file, valid_workable_file};
use casper::parallel::ParallelConfig;
use chrono::Local;
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

mod cli;

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<usize> {
    ParallelConfig::new(args.threads).setup_global_pool()?;

    let input = valid_input_file(&args.input)?;
    if !valid_workable_file(&input, log::logger()) {
        return Err(CasperError::InvalidInput {
            path: input.display().to_string(),
            reason: "not a readable, non-empty NetCDF/HDF5 file".to_string(),
        });
    }

    casper::convert(&input, &args.output_path())
}

/// `[timestamp] {file:line} LEVEL - message`; RUST_LOG overrides the level
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            let file = record
                .file()
                .and_then(|f| Path::new(f).file_name())
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            writeln!(
                buf,
                "[{}] {{{}:{}}} {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                file,
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();
}
