//! Peer connection module
//!
//! Owns one stream to a remote peer. Nothing but the handshake may cross the
//! stream until the handshake has completed, and every exchange is bounded by
//! the per-operation timeout.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::error::{TorrentError, TorrentResult};
use crate::peer::PeerAddr;
use crate::protocol::{perform_handshake, read_frame, write_frame, Frame, Handshake, Message};

/// Represents a connected peer
#[derive(Debug)]
pub struct PeerConnection<S = TcpStream> {
    /// Remote address, used for logging and error context
    addr: String,
    stream: S,
    /// Whether handshake has been completed
    handshake_completed: bool,
    remote_peer_id: Option<[u8; 20]>,
    op_timeout: Duration,
}

impl PeerConnection<TcpStream> {
    /// Dial a peer and perform the handshake
    pub async fn connect(
        addr: PeerAddr,
        info_hash: [u8; 20],
        our_peer_id: [u8; 20],
        dial_timeout: Duration,
        op_timeout: Duration,
    ) -> TorrentResult<Self> {
        info!("Connecting to peer: {}", addr);

        let socket = timeout(dial_timeout, TcpStream::connect(addr.to_socket_addr()))
            .await
            .map_err(|e| {
                warn!("Connection timeout to {}", addr);
                TorrentError::session_error_full("Connection timeout", addr.to_string(), e.to_string())
            })?
            .map_err(|e| {
                error!("Failed to connect to {}: {}", addr, e);
                TorrentError::session_error_full("Failed to connect", addr.to_string(), e.to_string())
            })?;

        debug!("Connected to peer: {}", addr);
        let mut connection = Self::new(socket, addr.to_string(), op_timeout);
        connection.handshake(info_hash, our_peer_id).await?;

        info!("Successfully connected and handshaked with peer: {}", addr);
        Ok(connection)
    }
}

impl<S> PeerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already opened stream; the handshake is still outstanding
    pub fn new(stream: S, addr: impl Into<String>, op_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            stream,
            handshake_completed: false,
            remote_peer_id: None,
            op_timeout,
        }
    }

    /// Perform the BitTorrent handshake
    pub async fn handshake(&mut self, info_hash: [u8; 20], our_peer_id: [u8; 20]) -> TorrentResult<Handshake> {
        debug!("Performing handshake with peer: {}", self.addr);

        let theirs = timeout(self.op_timeout, perform_handshake(&mut self.stream, info_hash, our_peer_id))
            .await
            .map_err(|e| {
                warn!("Handshake timeout with peer: {}", self.addr);
                TorrentError::session_error_full("Handshake timeout", self.addr.clone(), e.to_string())
            })?
            .map_err(|e| {
                error!("Handshake failed with {}: {}", self.addr, e);
                e.with_peer(self.addr.clone())
            })?;

        self.remote_peer_id = Some(theirs.peer_id);
        self.handshake_completed = true;
        debug!("Handshake completed successfully with peer: {}", self.addr);
        Ok(theirs)
    }

    /// Send a message to the peer
    pub async fn send(&mut self, message: &Message) -> TorrentResult<()> {
        self.ensure_handshaked("send")?;

        trace!("Sending {:?} message to peer: {}", message.kind(), self.addr);
        let frame = Frame::Message(message.clone());
        timeout(self.op_timeout, write_frame(&mut self.stream, &frame))
            .await
            .map_err(|e| {
                warn!("Send message timeout to peer: {}", self.addr);
                TorrentError::session_error_full("Send message timeout", self.addr.clone(), e.to_string())
            })?
            .map_err(|e| {
                debug!("Failed to send message to {}: {}", self.addr, e);
                TorrentError::session_error_full("Failed to send message", self.addr.clone(), e.to_string())
            })
    }

    /// Receive the next frame from the peer
    pub async fn receive(&mut self) -> TorrentResult<Frame> {
        self.receive_until(Instant::now() + self.op_timeout).await
    }

    /// Receive the next frame, failing once `deadline` has passed
    ///
    /// Callers waiting on a specific answer share one deadline across every
    /// frame they read, so unrelated traffic does not extend the wait.
    pub async fn receive_until(&mut self, deadline: Instant) -> TorrentResult<Frame> {
        self.ensure_handshaked("receive")?;

        let frame = timeout_at(deadline, read_frame(&mut self.stream))
            .await
            .map_err(|e| {
                warn!("Receive message timeout from peer: {}", self.addr);
                TorrentError::session_error_full("Receive message timeout", self.addr.clone(), e.to_string())
            })?
            .map_err(|e| match e {
                TorrentError::SessionError { .. } => e.with_peer(self.addr.clone()),
                other => {
                    debug!("Failed to read message from {}: {}", self.addr, other);
                    TorrentError::session_error_full("Failed to read message", self.addr.clone(), other.to_string())
                }
            })?;

        trace!("Received {:?} from peer: {}", frame, self.addr);
        Ok(frame)
    }

    fn ensure_handshaked(&self, operation: &str) -> TorrentResult<()> {
        if self.handshake_completed {
            return Ok(());
        }
        error!("Attempted to {} before handshake completion with peer: {}", operation, self.addr);
        Err(TorrentError::session_error_full(
            format!("Cannot {}: handshake not completed", operation),
            self.addr.clone(),
            "handshake not completed",
        ))
    }

    /// Get the peer's address
    pub fn peer_addr(&self) -> &str {
        &self.addr
    }

    /// Budget for the handshake and for each request/response exchange
    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    /// Peer ID the remote announced in its handshake
    pub fn remote_peer_id(&self) -> Option<[u8; 20]> {
        self.remote_peer_id
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.handshake_completed
    }
}
