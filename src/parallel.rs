//! Rayon thread pool configuration
//!
//! Rows of each CSV window are rendered on the global Rayon pool; this module
//! sizes that pool once per process.

use crate::errors::{CasperError, Result};
use rayon::ThreadPoolBuilder;

/// Configuration for parallel row rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Use one thread per CPU core
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Set up the global Rayon thread pool.
    ///
    /// Without an explicit thread count Rayon's default sizing is left alone.
    /// The global pool can be built only once per process.
    pub fn setup_global_pool(&self) -> Result<()> {
        match self.num_threads {
            Some(0) => Err(CasperError::ThreadPoolError(
                "thread count must be at least 1".to_string(),
            )),
            Some(num_threads) => {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build_global()
                    .map_err(|e| {
                        CasperError::ThreadPoolError(format!(
                            "Failed to initialize thread pool with {} threads: {}",
                            num_threads, e
                        ))
                    })?;
                log::debug!("Configured parallel processing with {} threads", num_threads);
                Ok(())
            }
            None => {
                log::debug!(
                    "Using default thread pool configuration ({} threads)",
                    rayon::current_num_threads()
                );
                Ok(())
            }
        }
    }

    /// Threads in the pool the current thread would use
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}
