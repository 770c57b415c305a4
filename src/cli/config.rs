//! CLI configuration module
//!
//! Resolves CLI arguments into validated run settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::args::CliArgs;
use crate::download::DownloadSettings;
use crate::error::{TorrentError, TorrentResult};
use crate::protocol::Handshake;

/// Output name used when the torrent's suggested name is unusable
pub const DEFAULT_OUTPUT_NAME: &str = "download";

/// Configuration for the torrent downloader
#[derive(Debug, Clone)]
pub struct Config {
    /// Torrent descriptor to download
    pub torrent_file: PathBuf,
    /// Explicit output file, if given
    pub output: Option<PathBuf>,
    /// Port reported to the tracker
    pub port: u16,
    /// Maximum concurrent workers
    pub max_workers: usize,
    /// Our peer ID as raw bytes
    pub peer_id: Vec<u8>,
    pub connect_timeout: Duration,
    pub op_timeout: Duration,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        let peer_id = args
            .peer_id
            .as_ref()
            .map(|id| id.as_bytes().to_vec())
            .unwrap_or_else(|| Handshake::generate_peer_id().to_vec());

        Self {
            torrent_file: args.torrent_file.clone(),
            output: args.output.clone(),
            port: args.port,
            max_workers: args.max_workers,
            peer_id,
            connect_timeout: Duration::from_secs(args.connect_timeout),
            op_timeout: Duration::from_secs(args.op_timeout),
            verbose: args.verbose,
            quiet: args.quiet,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> TorrentResult<()> {
        if self.port == 0 {
            return Err(TorrentError::config_error_with_field("Port cannot be 0", "port"));
        }

        if self.max_workers == 0 {
            return Err(TorrentError::config_error_with_field(
                "max_workers must be at least 1",
                "max_workers",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(TorrentError::config_error_with_field(
                "connect_timeout must be at least 1 second",
                "connect_timeout",
            ));
        }

        if self.op_timeout.is_zero() {
            return Err(TorrentError::config_error_with_field(
                "op_timeout must be at least 1 second",
                "op_timeout",
            ));
        }

        if self.peer_id.len() != 20 {
            return Err(TorrentError::config_error_with_field(
                format!("peer_id must be exactly 20 bytes, got {}", self.peer_id.len()),
                "peer_id",
            ));
        }

        if let Some(output) = &self.output {
            if output.as_os_str().is_empty() {
                return Err(TorrentError::config_error_with_field("output cannot be empty", "output"));
            }
        }

        Ok(())
    }

    /// Peer ID as the fixed-size array the wire protocol needs
    pub fn peer_id_bytes(&self) -> TorrentResult<[u8; 20]> {
        self.peer_id.as_slice().try_into().map_err(|_| {
            TorrentError::config_error_with_field("peer_id must be exactly 20 bytes", "peer_id")
        })
    }

    /// Where the downloaded file goes
    pub fn output_path(&self, torrent_name: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(sanitize_filename(torrent_name)))
    }

    /// Settings handed to the download manager
    pub fn download_settings(&self) -> TorrentResult<DownloadSettings> {
        let mut settings = DownloadSettings::new(self.peer_id_bytes()?);
        settings.max_workers = self.max_workers;
        settings.dial_timeout = self.connect_timeout;
        settings.op_timeout = self.op_timeout;
        Ok(settings)
    }

    pub fn torrent_file(&self) -> &Path {
        &self.torrent_file
    }
}

/// Turn a torrent-supplied name into a single safe path component
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        DEFAULT_OUTPUT_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(extra: &[&str]) -> Config {
        let mut argv = vec!["torrent-fetch", "test.torrent"];
        argv.extend_from_slice(extra);
        Config::from_args(&CliArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_config_from_args() {
        let config = config(&["-o", "/tmp/out.bin", "-p", "6882", "-w", "3", "--op-timeout", "5"]);

        assert_eq!(config.torrent_file(), Path::new("test.torrent"));
        assert_eq!(config.output, Some(PathBuf::from("/tmp/out.bin")));
        assert_eq!(config.port, 6882);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.op_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generated_peer_id() {
        let config = config(&[]);
        assert_eq!(config.peer_id.len(), 20);
        assert!(config.peer_id.starts_with(b"-TF0001-"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_peer_id() {
        let config = config(&["--peer-id", "-GT0001-123456789012"]);
        assert_eq!(&config.peer_id_bytes().unwrap(), b"-GT0001-123456789012");

        let settings = config.download_settings().unwrap();
        assert_eq!(&settings.peer_id, b"-GT0001-123456789012");
        assert_eq!(settings.max_workers, 10);
        assert_eq!(settings.dial_timeout, Duration::from_secs(10));
        assert_eq!(settings.op_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_validate_rejects() {
        for extra in [
            &["-p", "0"][..],
            &["-w", "0"],
            &["--connect-timeout", "0"],
            &["--op-timeout", "0"],
            &["--peer-id", "too-short"],
        ] {
            let err = config(extra).validate().unwrap_err();
            assert!(matches!(err, TorrentError::ConfigError { .. }), "accepted {:?}", extra);
        }

        let mut empty_output = config(&[]);
        empty_output.output = Some(PathBuf::new());
        assert!(empty_output.validate().is_err());
    }

    #[test]
    fn test_output_path() {
        assert_eq!(config(&[]).output_path("ubuntu.iso"), PathBuf::from("ubuntu.iso"));
        assert_eq!(config(&["-o", "x.bin"]).output_path("ubuntu.iso"), PathBuf::from("x.bin"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("file.txt"), "file.txt");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("a\\b"), "a_b");
        assert_eq!(sanitize_filename(""), "download");
        assert_eq!(sanitize_filename(".."), "download");
        assert_eq!(sanitize_filename("  "), "download");
    }
}
