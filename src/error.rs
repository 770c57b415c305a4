//! Error types for the torrent downloader
//!
//! One error type covers every failure the download pipeline can report,
//! from descriptor loading through peer sessions to the final file write.

use std::fmt;

/// Result alias used by the protocol, peer and storage layers
pub type TorrentResult<T> = std::result::Result<T, TorrentError>;

/// Specific cause of a rejected handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// Length byte or protocol literal differs from "BitTorrent protocol"
    ProtocolMismatch,
    /// Peer answered for a different torrent
    InfoHashMismatch,
    /// Fewer than 68 bytes arrived before the stream ended
    Truncated,
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeFailure::ProtocolMismatch => write!(f, "invalid protocol string in handshake"),
            HandshakeFailure::InfoHashMismatch => write!(f, "info_hash mismatch in handshake"),
            HandshakeFailure::Truncated => write!(f, "truncated handshake"),
        }
    }
}

/// Comprehensive error type for torrent operations
#[derive(Debug, Clone)]
pub enum TorrentError {
    /// Socket or file read/write errors
    IoError {
        message: String,
        path: Option<String>,
        source: Option<String>,
    },

    /// Handshake rejected or cut short
    HandshakeError {
        reason: HandshakeFailure,
        peer: Option<String>,
    },

    /// Peer session errors (timeout, disconnect, read failure mid-piece)
    SessionError {
        message: String,
        peer: Option<String>,
        source: Option<String>,
    },

    /// Piece digest errors
    VerificationError {
        message: String,
        piece: Option<u32>,
    },

    /// Malformed or inconsistent torrent descriptor
    MetadataError {
        message: String,
        field: Option<String>,
    },

    /// Tracker unreachable or answered with garbage
    TrackerError {
        message: String,
        url: Option<String>,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },
}

impl TorrentError {
    /// Create a new IoError
    pub fn io_error(message: impl Into<String>) -> Self {
        TorrentError::IoError {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a new IoError with path and source
    pub fn io_error_full(message: impl Into<String>, path: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::IoError {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new HandshakeError
    pub fn handshake_error(reason: HandshakeFailure) -> Self {
        TorrentError::HandshakeError { reason, peer: None }
    }

    /// Create a new SessionError
    pub fn session_error(message: impl Into<String>) -> Self {
        TorrentError::SessionError {
            message: message.into(),
            peer: None,
            source: None,
        }
    }

    /// Create a new SessionError with peer and source
    pub fn session_error_full(message: impl Into<String>, peer: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::SessionError {
            message: message.into(),
            peer: Some(peer.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new VerificationError
    pub fn verification_error(message: impl Into<String>) -> Self {
        TorrentError::VerificationError {
            message: message.into(),
            piece: None,
        }
    }

    /// Create a new VerificationError for a specific piece
    pub fn verification_error_for_piece(message: impl Into<String>, piece: u32) -> Self {
        TorrentError::VerificationError {
            message: message.into(),
            piece: Some(piece),
        }
    }

    /// Create a new MetadataError
    pub fn metadata_error(message: impl Into<String>) -> Self {
        TorrentError::MetadataError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new MetadataError with field
    pub fn metadata_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        TorrentError::MetadataError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new TrackerError
    pub fn tracker_error(message: impl Into<String>) -> Self {
        TorrentError::TrackerError {
            message: message.into(),
            url: None,
            source: None,
        }
    }

    /// Create a new TrackerError with url and source
    pub fn tracker_error_full(message: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::TrackerError {
            message: message.into(),
            url: Some(url.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        TorrentError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        TorrentError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Attach the remote peer address to peer-facing errors
    pub fn with_peer(mut self, addr: impl Into<String>) -> Self {
        let addr = addr.into();
        match &mut self {
            TorrentError::HandshakeError { peer, .. } | TorrentError::SessionError { peer, .. } => {
                if peer.is_none() {
                    *peer = Some(addr);
                }
            }
            _ => {}
        }
        self
    }

    /// Whether the error leaves the peer connection unusable
    ///
    /// Verification and metadata failures concern one piece only; the
    /// connection that delivered it is still in sync.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            TorrentError::IoError { .. } | TorrentError::HandshakeError { .. } | TorrentError::SessionError { .. }
        )
    }
}

impl fmt::Display for TorrentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentError::IoError { message, path, source } => match (path, source) {
                (Some(p), Some(s)) => write!(f, "I/O error: {} (path: {}, source: {})", message, p, s),
                (Some(p), None) => write!(f, "I/O error: {} (path: {})", message, p),
                (None, Some(s)) => write!(f, "I/O error: {} (source: {})", message, s),
                (None, None) => write!(f, "I/O error: {}", message),
            },
            TorrentError::HandshakeError { reason, peer } => {
                if let Some(p) = peer {
                    write!(f, "Handshake error: {} (peer: {})", reason, p)
                } else {
                    write!(f, "Handshake error: {}", reason)
                }
            }
            TorrentError::SessionError { message, peer, source } => match (peer, source) {
                (Some(p), Some(s)) => write!(f, "Session error: {} (peer: {}, source: {})", message, p, s),
                (Some(p), None) => write!(f, "Session error: {} (peer: {})", message, p),
                (None, Some(s)) => write!(f, "Session error: {} (source: {})", message, s),
                (None, None) => write!(f, "Session error: {}", message),
            },
            TorrentError::VerificationError { message, piece } => {
                if let Some(index) = piece {
                    write!(f, "Verification error: {} (piece: {})", message, index)
                } else {
                    write!(f, "Verification error: {}", message)
                }
            }
            TorrentError::MetadataError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Metadata error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Metadata error: {}", message)
                }
            }
            TorrentError::TrackerError { message, url, source } => match (url, source) {
                (Some(u), Some(s)) => write!(f, "Tracker error: {} (url: {}, source: {})", message, u, s),
                (Some(u), None) => write!(f, "Tracker error: {} (url: {})", message, u),
                (None, Some(s)) => write!(f, "Tracker error: {} (source: {})", message, s),
                (None, None) => write!(f, "Tracker error: {}", message),
            },
            TorrentError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for TorrentError {}

impl From<std::io::Error> for TorrentError {
    fn from(err: std::io::Error) -> Self {
        TorrentError::IoError {
            message: err.to_string(),
            path: None,
            source: Some(err.kind().to_string()),
        }
    }
}

// serde_bencode::Error is the public type, not de::Error or ser::Error
impl From<serde_bencode::Error> for TorrentError {
    fn from(err: serde_bencode::Error) -> Self {
        TorrentError::TrackerError {
            message: "Failed to decode tracker response".to_string(),
            url: None,
            source: Some(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for TorrentError {
    fn from(err: reqwest::Error) -> Self {
        TorrentError::TrackerError {
            message: "Tracker request failed".to_string(),
            url: err.url().map(|u| u.to_string()),
            source: Some(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for TorrentError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TorrentError::session_error("Operation timed out")
    }
}
