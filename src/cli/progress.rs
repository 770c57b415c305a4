//! Progress display module
//!
//! Per-piece report lines and the end-of-run summary.

use std::time::Duration;

use crate::download::DownloadSummary;
use crate::error::TorrentError;
use crate::torrent::TorrentInfo;

/// Running piece tally for progress display
#[derive(Debug, Clone, Default)]
pub struct DownloadStats {
    /// Pieces verified and written
    pub completed: usize,
    /// Pieces that failed
    pub failed: usize,
    /// Total pieces in the torrent
    pub total_pieces: usize,
}

impl DownloadStats {
    /// Create new download stats
    pub fn new(total_pieces: usize) -> Self {
        Self {
            total_pieces,
            ..Self::default()
        }
    }

    /// Share of pieces completed, in percent
    pub fn percent_complete(&self) -> f64 {
        if self.total_pieces == 0 {
            0.0
        } else {
            self.completed as f64 * 100.0 / self.total_pieces as f64
        }
    }

    /// Format bytes to human readable string
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_index])
    }

    /// Format speed to human readable string
    pub fn format_speed(bytes_per_sec: f64) -> String {
        format!("{}/s", Self::format_bytes(bytes_per_sec as u64))
    }

    /// Format duration to human readable string
    pub fn format_duration(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else if total_secs > 0 {
            format!("{}s", seconds)
        } else {
            format!("{}ms", duration.as_millis())
        }
    }
}

/// Progress display for CLI
#[derive(Debug)]
pub struct ProgressDisplay {
    stats: DownloadStats,
    /// Quiet mode (no progress output)
    quiet: bool,
}

impl ProgressDisplay {
    /// Create a new progress display
    pub fn new(quiet: bool) -> Self {
        Self {
            stats: DownloadStats::default(),
            quiet,
        }
    }

    /// Print the descriptor fields and reset the tally for this torrent
    pub fn print_torrent_info(&mut self, torrent: &TorrentInfo) {
        self.stats = DownloadStats::new(torrent.piece_count());
        if self.quiet {
            return;
        }

        println!("Tracker URL: {}", torrent.announce);
        println!("File name: {}", torrent.name);
        println!(
            "File length: {} ({} bytes)",
            DownloadStats::format_bytes(torrent.total_size()),
            torrent.total_size()
        );
        println!(
            "Pieces: {} x {}",
            torrent.piece_count(),
            DownloadStats::format_bytes(torrent.piece_length as u64)
        );
        println!("Info hash: {}", torrent.info_hash_hex());
    }

    /// Print the number of peers the tracker returned
    pub fn print_peer_count(&self, peers: usize) {
        if !self.quiet {
            println!("Found {} peers", peers);
        }
    }

    /// Report a verified and written piece
    pub fn piece_completed(&mut self, index: u32) {
        self.stats.completed += 1;
        if !self.quiet {
            println!("{}", Self::completed_line(index, &self.stats));
        }
    }

    /// Report a failed piece
    pub fn piece_failed(&mut self, index: u32, error: &TorrentError) {
        self.stats.failed += 1;
        if !self.quiet {
            println!("{}", Self::failed_line(index, error));
        }
    }

    /// Report an attempt abandoned with its peer; the piece is retried elsewhere
    pub fn piece_requeued(&self, index: u32, error: &TorrentError) {
        if !self.quiet {
            println!("{}", Self::requeued_line(index, error));
        }
    }

    /// Print the end-of-run summary
    pub fn print_summary(&self, summary: &DownloadSummary) {
        if self.quiet {
            return;
        }

        println!();
        for line in Self::summary_lines(summary) {
            println!("{}", line);
        }
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Print a warning message
    pub fn print_warning(&self, message: &str) {
        eprintln!("Warning: {}", message);
    }

    fn completed_line(index: u32, stats: &DownloadStats) -> String {
        format!(
            "Downloaded piece {} ({}/{}, {:.2}% complete)",
            index,
            stats.completed,
            stats.total_pieces,
            stats.percent_complete()
        )
    }

    fn failed_line(index: u32, error: &TorrentError) -> String {
        format!("Failed to download piece {}: {}", index, error)
    }

    fn requeued_line(index: u32, error: &TorrentError) -> String {
        format!("Retrying piece {} with another peer: {}", index, error)
    }

    fn summary_lines(summary: &DownloadSummary) -> Vec<String> {
        let headline = if summary.is_complete() {
            format!("Download completed successfully in {}", DownloadStats::format_duration(summary.elapsed))
        } else {
            format!(
                "Download finished with {} of {} pieces missing in {}",
                summary.failed,
                summary.total_pieces,
                DownloadStats::format_duration(summary.elapsed)
            )
        };

        vec![
            headline,
            format!("  Pieces: {} completed, {} failed, {} total", summary.completed, summary.failed, summary.total_pieces),
            format!("  Written: {}", DownloadStats::format_bytes(summary.bytes_written)),
            format!("  Average download speed: {}", DownloadStats::format_speed(summary.average_speed())),
        ]
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
