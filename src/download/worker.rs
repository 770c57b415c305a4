//! Download worker
//!
//! One worker per bound peer: it dials once, then pulls piece indices from
//! the shared queue until the queue is exhausted or the connection breaks.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::download::{DownloadSettings, JobQueue};
use crate::error::{TorrentError, TorrentResult};
use crate::peer::{PeerAddr, PeerConnection, PeerSession};
use crate::torrent::TorrentInfo;

/// Outcome of one piece attempt
#[derive(Debug)]
pub struct PieceResult {
    pub index: u32,
    pub outcome: TorrentResult<Vec<u8>>,
    /// The attempt was abandoned and the piece went back on the queue
    pub requeued: bool,
}

impl PieceResult {
    /// Final result for a piece
    pub fn finished(index: u32, outcome: TorrentResult<Vec<u8>>) -> Self {
        Self {
            index,
            outcome,
            requeued: false,
        }
    }

    /// Attempt lost with its connection; another worker will retry the piece
    pub fn requeued(index: u32, error: TorrentError) -> Self {
        Self {
            index,
            outcome: Err(error),
            requeued: true,
        }
    }
}

/// Worker bound to a single peer
pub struct Worker {
    id: usize,
    peer: PeerAddr,
    torrent: Arc<TorrentInfo>,
    settings: DownloadSettings,
    queue: Arc<JobQueue>,
    results: UnboundedSender<PieceResult>,
}

impl Worker {
    pub fn new(
        id: usize,
        peer: PeerAddr,
        torrent: Arc<TorrentInfo>,
        settings: DownloadSettings,
        queue: Arc<JobQueue>,
        results: UnboundedSender<PieceResult>,
    ) -> Self {
        Self {
            id,
            peer,
            torrent,
            settings,
            queue,
            results,
        }
    }

    /// Connect to the bound peer and work until done or disconnected
    pub async fn run(self) {
        let connection = match PeerConnection::connect(
            self.peer,
            self.torrent.info_hash,
            self.settings.peer_id,
            self.settings.dial_timeout,
            self.settings.op_timeout,
        )
        .await
        {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Worker {} could not set up peer {}: {}", self.id, self.peer, e);
                return;
            }
        };

        self.drive(PeerSession::new(connection)).await;
    }

    /// Pull jobs and download them over an established session
    ///
    /// A connection failure puts the in-flight piece back on the queue and
    /// retires the worker. Any other failure is reported for that piece and
    /// the worker moves on.
    pub async fn drive<S>(&self, mut session: PeerSession<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut downloaded = 0usize;

        while let Some(index) = self.queue.next().await {
            debug!("Worker {} picked piece {}", self.id, index);

            let outcome = match session.download_piece(&self.torrent, index).await {
                Err(e) if e.is_connection_failure() => {
                    warn!(
                        "Worker {} lost peer {} during piece {}: {}; returning piece to the queue",
                        self.id, self.peer, index, e
                    );
                    self.queue.requeue(index).await;
                    let _ = self.results.send(PieceResult::requeued(index, e));
                    return;
                }
                Ok(data) => {
                    downloaded += 1;
                    debug!("Worker {} verified piece {} from peer {}", self.id, index, self.peer);
                    Ok(data)
                }
                Err(e) => {
                    warn!("Worker {} failed piece {} from peer {}: {}", self.id, index, self.peer, e);
                    Err(e)
                }
            };

            self.queue.finish().await;
            if self.results.send(PieceResult::finished(index, outcome)).is_err() {
                debug!("Worker {} stopping: result channel closed", self.id);
                return;
            }
        }

        info!(
            "Worker {} finished with peer {} ({} pieces downloaded)",
            self.id, self.peer, downloaded
        );
    }
}
