//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the torrent downloader
#[derive(Debug, Parser)]
#[command(name = "torrent-fetch")]
#[command(about = "Download a single-file torrent from its tracker's peers", long_about = None)]
pub struct CliArgs {
    /// Path to the .torrent file
    #[arg(value_name = "TORRENT_FILE")]
    pub torrent_file: PathBuf,

    /// Output file (defaults to the name stored in the torrent)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Port reported to the tracker
    #[arg(short, long, default_value_t = 6881)]
    pub port: u16,

    /// Maximum number of peers downloaded from at once
    #[arg(short = 'w', long, default_value_t = 10)]
    pub max_workers: usize,

    /// 20-byte peer ID to announce (random if omitted)
    #[arg(long, value_name = "ID")]
    pub peer_id: Option<String>,

    /// Seconds to wait for a TCP connection to a peer
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Seconds to wait for the handshake or any single message exchange
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub op_timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}
