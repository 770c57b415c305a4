//! torrent-fetch
//!
//! A minimal BitTorrent downloader: tracker discovery, concurrent piece
//! fetching over the peer wire protocol, and SHA-1 verified writes.

pub mod cli;
pub mod download;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod storage;
pub mod torrent;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use error::{HandshakeFailure, TorrentError, TorrentResult};

pub use cli::{CliArgs, Config, DownloadStats, ProgressDisplay};
pub use download::{DownloadManager, DownloadSettings, DownloadSummary, JobQueue, PieceResult};
pub use peer::{PeerAddr, PeerConnection, PeerSession};
pub use protocol::{Frame, Handshake, Message, MessageId};
pub use storage::{OutputFile, PieceBuffer};
pub use torrent::{TorrentInfo, TorrentParser};
pub use tracker::TrackerClient;
