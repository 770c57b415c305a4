//! torrent-fetch - Main entry point
//!
//! Loads a single-file torrent, asks its tracker for peers and downloads the
//! file with one worker per peer.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use torrent_fetch::cli::{CliArgs, Config, ProgressDisplay};
use torrent_fetch::download::{DownloadManager, DownloadSummary};
use torrent_fetch::storage::OutputFile;
use torrent_fetch::torrent::{TorrentInfo, TorrentParser};
use torrent_fetch::tracker::{AnnounceRequest, TrackerClient};
use tracing::{debug, error, info, warn};

/// Exit status when the run finished but pieces are missing
const EXIT_INCOMPLETE: u8 = 2;

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();
        match panic_info.location() {
            Some(location) => error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            ),
            None => error!("PANIC occurred at an unknown location"),
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    debug!("CLI arguments: {:?}", args);

    let mut progress = ProgressDisplay::new(args.quiet);
    match run(&args, &mut progress).await {
        Ok(summary) if summary.is_complete() => {
            info!("torrent-fetch finished");
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            progress.print_warning(&format!(
                "{} of {} pieces could not be downloaded; the output file is incomplete",
                summary.failed, summary.total_pieces
            ));
            ExitCode::from(EXIT_INCOMPLETE)
        }
        Err(e) => {
            error!("Download failed: {:#}", e);
            progress.print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if args.verbose {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    debug!("Logging initialized successfully");
}

/// Every setup step, then the download itself
async fn run(args: &CliArgs, progress: &mut ProgressDisplay) -> Result<DownloadSummary> {
    let config = Config::from_args(args);
    config.validate().context("Invalid configuration")?;

    let torrent = load_torrent_file(config.torrent_file())?;
    progress.print_torrent_info(&torrent);

    let settings = config.download_settings().context("Invalid configuration")?;

    let tracker = TrackerClient::new(&torrent.announce).context("Failed to set up tracker client")?;
    let announce = tracker
        .announce(&AnnounceRequest::new(&torrent, &settings.peer_id, config.port))
        .await
        .context("Failed to get peers from tracker")?;
    progress.print_peer_count(announce.peers.len());
    if announce.peers.is_empty() {
        bail!("Tracker returned no peers");
    }

    let output_path = config.output_path(&torrent.name);
    let mut output = OutputFile::create(&output_path)
        .await
        .with_context(|| format!("Failed to create output file '{}'", output_path.display()))?;

    let manager = DownloadManager::new(Arc::new(torrent), settings);
    let summary = manager
        .run(&announce.peers, &mut output, progress)
        .await
        .with_context(|| format!("Download into '{}' aborted", output_path.display()))?;

    progress.print_summary(&summary);
    if !summary.is_complete() {
        warn!("Download incomplete: {} pieces failed", summary.failed);
    }
    Ok(summary)
}

/// Load and parse the torrent file
fn load_torrent_file(path: &Path) -> Result<TorrentInfo> {
    info!("Loading torrent file: {}", path.display());

    let info = TorrentParser::parse_file(path)
        .with_context(|| format!("Failed to load torrent file '{}'", path.display()))?;

    info!(
        "Loaded torrent '{}': {} bytes in {} pieces",
        info.name,
        info.total_size(),
        info.piece_count()
    );
    Ok(info)
}
