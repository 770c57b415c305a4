//! CLI module
//!
//! Command-line interface for the torrent downloader.

pub mod args;
pub mod config;
pub mod progress;

pub use args::CliArgs;
pub use config::{sanitize_filename, Config};
pub use progress::{DownloadStats, ProgressDisplay};
