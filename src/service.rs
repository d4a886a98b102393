//! Service adapter: fetch an input, convert it, stage the archive
//!
//! Fetching and staging sit behind async traits; the local implementations
//! handle `file://` URLs and plain paths. The conversion itself is blocking
//! and runs on Tokio's blocking pool.

use crate::convert::convert;
use crate::errors::{CasperError, Result};
use crate::file_ops::archive_name;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Media type of staged archives
pub const ZIP_MEDIA_TYPE: &str = "application/zip";

/// Brings a remote input into a local working directory
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Downloads `url` into `dest_dir` and returns the local path
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Publishes a local result file
#[async_trait]
pub trait Stager: Send + Sync {
    /// Stages `local` under `remote_name` and returns its URL
    async fn stage(&self, local: &Path, remote_name: &str, media_type: &str) -> Result<String>;
}

/// Strips a `file://` scheme; other schemes yield `None`, plain paths pass through
fn local_path(url: &str) -> Option<PathBuf> {
    match url.split_once("://") {
        Some(("file", rest)) => Some(PathBuf::from(rest)),
        Some(_) => None,
        None => Some(PathBuf::from(url)),
    }
}

/// Copies `file://` URLs and plain paths into the working directory
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

#[async_trait]
impl Fetcher for LocalFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let source = local_path(url)
            .ok_or_else(|| CasperError::Service(format!("unsupported input URL '{}'", url)))?;

        let filename = match source.file_name() {
            Some(name) if source.extension().is_some() => name.to_os_string(),
            _ => {
                log::warn!("Origin filename could not be ascertained - {}", url);
                "input".into()
            }
        };

        let dest = dest_dir.join(filename);
        tokio::fs::copy(&source, &dest).await.map_err(|e| {
            CasperError::Service(format!("fetching '{}' failed: {}", url, e))
        })?;
        Ok(dest)
    }
}

/// Copies results into a `file://` staging location
#[derive(Debug, Clone)]
pub struct LocalStager {
    location: String,
}

impl LocalStager {
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
        }
    }
}

#[async_trait]
impl Stager for LocalStager {
    async fn stage(&self, local: &Path, remote_name: &str, _media_type: &str) -> Result<String> {
        let dir = match self.location.split_once("://") {
            Some(("file", rest)) => PathBuf::from(rest),
            _ => {
                return Err(CasperError::Service(format!(
                    "unsupported staging location '{}'",
                    self.location
                )))
            }
        };

        let dest = dir.join(remote_name);
        log::info!("Staging to local filesystem: '{}'", dest.display());
        tokio::fs::copy(local, &dest).await.map_err(|e| {
            CasperError::Service(format!("staging '{}' failed: {}", dest.display(), e))
        })?;
        Ok(format!("file://{}", dest.display()))
    }
}

/// One conversion job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    pub input_url: String,
}

/// Result of a processed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    pub staged_url: String,
    pub filename: String,
    pub media_type: String,
    pub csv_files: usize,
}

/// Runs requests through fetch → convert → stage
pub struct ServiceAdapter<F: Fetcher, S: Stager> {
    fetcher: F,
    stager: S,
}

impl<F: Fetcher, S: Stager> ServiceAdapter<F, S> {
    pub fn new(fetcher: F, stager: S) -> Self {
        Self { fetcher, stager }
    }

    pub async fn process(&self, request: &ServiceRequest) -> Result<ServiceOutcome> {
        log::info!("Processing {}", request.input_url);
        match self.process_in_workdir(request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!("Processing {} failed: {}", request.input_url, e);
                Err(e)
            }
        }
    }

    async fn process_in_workdir(&self, request: &ServiceRequest) -> Result<ServiceOutcome> {
        let workdir = tempfile::tempdir()
            .map_err(|e| CasperError::Service(format!("creating a working directory: {}", e)))?;

        let input = self.fetcher.fetch(&request.input_url, workdir.path()).await?;
        let filename = archive_name(&input);
        let archive = workdir.path().join(&filename);

        log::info!("Running casper on {}", input.display());
        let csv_files = {
            let archive = archive.clone();
            tokio::task::spawn_blocking(move || convert(&input, &archive))
                .await
                .map_err(|e| CasperError::Service(format!("conversion task failed: {}", e)))??
        };
        log::info!("Conversion completed. Zip file created {}", filename);

        let staged_url = self
            .stager
            .stage(&archive, &filename, ZIP_MEDIA_TYPE)
            .await?;

        Ok(ServiceOutcome {
            staged_url,
            filename,
            media_type: ZIP_MEDIA_TYPE.to_string(),
            csv_files,
        })
    }
}
