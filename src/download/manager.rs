//! Download manager module
//!
//! Spawns the feeder and one worker per bound peer, then collects piece
//! results in completion order and writes verified pieces at their offsets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cli::ProgressDisplay;
use crate::download::{JobQueue, PieceResult, Worker};
use crate::error::{TorrentError, TorrentResult};
use crate::peer::PeerAddr;
use crate::storage::OutputFile;
use crate::torrent::TorrentInfo;

/// Default cap on concurrent workers
pub const DEFAULT_MAX_WORKERS: usize = 10;
/// Default TCP dial timeout
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bound on the handshake, each frame write and each request/response exchange
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Knobs shared by every worker in a run
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Our peer ID
    pub peer_id: [u8; 20],
    /// Maximum concurrent workers
    pub max_workers: usize,
    pub dial_timeout: Duration,
    pub op_timeout: Duration,
}

impl DownloadSettings {
    /// Settings with default limits
    pub fn new(peer_id: [u8; 20]) -> Self {
        Self {
            peer_id,
            max_workers: DEFAULT_MAX_WORKERS,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

/// Final tally of a run
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSummary {
    /// Pieces verified and written
    pub completed: usize,
    /// Pieces that failed or were never downloaded
    pub failed: usize,
    pub total_pieces: usize,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

impl DownloadSummary {
    /// Every piece is on disk
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.completed == self.total_pieces
    }

    /// Average throughput in bytes per second
    pub fn average_speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_written as f64 / secs
        } else {
            0.0
        }
    }
}

/// Download manager for one torrent
pub struct DownloadManager {
    torrent: Arc<TorrentInfo>,
    settings: DownloadSettings,
}

impl DownloadManager {
    /// Create a new download manager
    pub fn new(torrent: Arc<TorrentInfo>, settings: DownloadSettings) -> Self {
        Self { torrent, settings }
    }

    /// Number of workers a run over `peer_count` peers starts
    pub fn worker_count(&self, peer_count: usize) -> usize {
        peer_count.min(self.settings.max_workers)
    }

    /// Download every piece from `peers` into `output`
    ///
    /// Per-piece failures are counted in the summary. Only a failed write to
    /// the output aborts the run with an error.
    pub async fn run(
        &self,
        peers: &[PeerAddr],
        output: &mut OutputFile,
        progress: &mut ProgressDisplay,
    ) -> TorrentResult<DownloadSummary> {
        let start = Instant::now();
        let total_pieces = self.torrent.piece_count();
        let queue = Arc::new(JobQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<PieceResult>();

        let feeder = {
            let queue = Arc::clone(&queue);
            let count = total_pieces as u32;
            tokio::spawn(async move {
                for index in 0..count {
                    queue.push(index).await;
                }
                queue.close().await;
            })
        };

        let worker_count = self.worker_count(peers.len());
        info!(
            "Starting download of {} pieces with {} workers ({} peers available)",
            total_pieces,
            worker_count,
            peers.len()
        );

        let workers: Vec<JoinHandle<()>> = peers
            .iter()
            .take(worker_count)
            .enumerate()
            .map(|(id, peer)| {
                let worker = Worker::new(
                    id,
                    *peer,
                    Arc::clone(&self.torrent),
                    self.settings.clone(),
                    Arc::clone(&queue),
                    tx.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        drop(tx);

        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut bytes_written = 0u64;
        let mut reported = vec![false; total_pieces];

        while completed + failed < total_pieces {
            let Some(result) = rx.recv().await else {
                break;
            };

            match result.outcome {
                Err(e) if result.requeued => progress.piece_requeued(result.index, &e),
                Ok(data) => {
                    let offset = self.torrent.piece_offset(result.index);
                    if let Err(e) = output.write_at(offset, &data).await {
                        error!("Failed to write piece {}: {}", result.index, e);
                        feeder.abort();
                        for worker in &workers {
                            worker.abort();
                        }
                        return Err(e);
                    }
                    completed += 1;
                    bytes_written += data.len() as u64;
                    reported[result.index as usize] = true;
                    progress.piece_completed(result.index);
                }
                Err(e) => {
                    failed += 1;
                    reported[result.index as usize] = true;
                    progress.piece_failed(result.index, &e);
                }
            }
        }

        let unreported = total_pieces - completed - failed;
        if unreported > 0 {
            warn!("{} pieces were never downloaded: no usable peers left", unreported);
            let reason = TorrentError::session_error("no usable peers left");
            for index in (0..total_pieces).filter(|&i| !reported[i]) {
                progress.piece_failed(index as u32, &reason);
            }
            failed += unreported;
        }

        for worker in workers {
            if let Err(e) = worker.await {
                debug!("Worker task ended abnormally: {}", e);
            }
        }
        feeder.abort();

        output.sync().await?;

        let summary = DownloadSummary {
            completed,
            failed,
            total_pieces,
            bytes_written,
            elapsed: start.elapsed(),
        };
        info!(
            "Download finished: {}/{} pieces, {} failed, {} bytes written in {:?}",
            summary.completed, summary.total_pieces, summary.failed, summary.bytes_written, summary.elapsed
        );
        Ok(summary)
    }
}
