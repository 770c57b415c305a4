//! File storage module
//!
//! Offset-addressed writes of verified pieces into the single output file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, error, info, trace};

use crate::error::{TorrentError, TorrentResult};

/// Output file for downloaded data
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    file: fs::File,
    bytes_written: u64,
}

impl OutputFile {
    /// Create (or truncate) the output file
    pub async fn create(path: impl Into<PathBuf>) -> TorrentResult<Self> {
        let path = path.into();
        info!("Creating output file: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating directory: {}", parent.display());
                fs::create_dir_all(parent).await.map_err(|e| {
                    error!("Failed to create directory '{}': {}", parent.display(), e);
                    TorrentError::io_error_full("Failed to create directory", parent.display().to_string(), e.to_string())
                })?;
            }
        }

        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| {
                error!("Failed to create file '{}': {}", path.display(), e);
                TorrentError::io_error_full("Failed to create file", path.display().to_string(), e.to_string())
            })?;

        Ok(Self {
            path,
            file,
            bytes_written: 0,
        })
    }

    /// Write data at a specific offset
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> TorrentResult<()> {
        trace!("Writing data at offset {} ({} bytes)", offset, data.len());
        let path = self.path.display().to_string();

        self.file.seek(std::io::SeekFrom::Start(offset)).await.map_err(|e| {
            error!("Failed to seek in file '{}': {}", path, e);
            TorrentError::io_error_full("Failed to seek in file", path.clone(), e.to_string())
        })?;
        self.file.write_all(data).await.map_err(|e| {
            error!("Failed to write to file '{}': {}", path, e);
            TorrentError::io_error_full("Failed to write to file", path.clone(), e.to_string())
        })?;
        self.file.flush().await.map_err(|e| {
            error!("Failed to flush file '{}': {}", path, e);
            TorrentError::io_error_full("Failed to flush file", path.clone(), e.to_string())
        })?;

        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush everything written so far to disk
    pub async fn sync(&mut self) -> TorrentResult<()> {
        self.file.sync_all().await.map_err(|e| {
            TorrentError::io_error_full("Failed to sync file", self.path.display().to_string(), e.to_string())
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes written through this handle
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
