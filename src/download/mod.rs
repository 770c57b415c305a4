//! Download orchestration
//!
//! Job queue, per-peer workers, and the collection loop that writes verified
//! pieces to the output file.

pub mod manager;
pub mod queue;
pub mod worker;

pub use manager::{
    DownloadManager, DownloadSettings, DownloadSummary, DEFAULT_DIAL_TIMEOUT, DEFAULT_MAX_WORKERS, DEFAULT_OP_TIMEOUT,
};
pub use queue::JobQueue;
pub use worker::{PieceResult, Worker};
