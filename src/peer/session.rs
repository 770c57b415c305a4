//! Peer session module
//!
//! Drives one handshaken connection through unchoke, sequential block
//! requests and verification, one piece at a time.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{TorrentError, TorrentResult};
use crate::peer::{PeerConnection, PeerState};
use crate::protocol::{Frame, Message, MessageId};
use crate::storage::{plan_blocks, BlockRequest, PieceBuffer};
use crate::torrent::TorrentInfo;

/// Piece download state for one connection
#[derive(Debug)]
pub struct PeerSession<S = TcpStream> {
    connection: PeerConnection<S>,
    state: PeerState,
}

impl<S> PeerSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(connection: PeerConnection<S>) -> Self {
        Self {
            connection,
            state: PeerState::default(),
        }
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn peer_addr(&self) -> &str {
        self.connection.peer_addr()
    }

    /// Download and verify one piece
    ///
    /// Returns the complete verified bytes or the first failure, never
    /// partial data.
    pub async fn download_piece(&mut self, torrent: &TorrentInfo, index: u32) -> TorrentResult<Vec<u8>> {
        let expected_hash = torrent.piece_hash(index).ok_or_else(|| {
            TorrentError::verification_error_for_piece("torrent metadata 'pieces' field too short", index)
        })?;

        self.await_unchoke().await?;

        let piece_size = torrent.piece_size(index);
        debug!(
            "Downloading piece {} ({} bytes) from peer: {}",
            index,
            piece_size,
            self.peer_addr()
        );

        let mut buffer = PieceBuffer::new(index, piece_size);
        for block in plan_blocks(index, piece_size) {
            self.fetch_block(&mut buffer, block).await?;
        }

        buffer.into_verified(expected_hash)
    }

    /// Wait until the peer unchokes us, announcing interest first if needed
    async fn await_unchoke(&mut self) -> TorrentResult<()> {
        if self.state.can_request() {
            return Ok(());
        }

        if !self.state.am_interested {
            debug!("Sending Interested to peer: {}", self.peer_addr());
            self.connection.send(&Message::interested()).await?;
            self.state.am_interested = true;
        }

        let deadline = Instant::now() + self.connection.op_timeout();
        while !self.state.can_request() {
            if let Frame::Message(message) = self.connection.receive_until(deadline).await? {
                self.update_choke(&message);
            }
        }
        debug!("Unchoked by peer: {}", self.peer_addr());
        Ok(())
    }

    /// Request one block and copy the matching answer into the buffer
    ///
    /// The whole exchange, including any re-sent request, shares one
    /// operation timeout. A choking peer drops pending requests, so the
    /// request goes out again on the unchoke that follows.
    async fn fetch_block(&mut self, buffer: &mut PieceBuffer, block: BlockRequest) -> TorrentResult<()> {
        trace!(
            "Requesting piece {} block {} ({} bytes) from peer: {}",
            block.index,
            block.begin,
            block.length,
            self.peer_addr()
        );
        let request = Message::request(block.index, block.begin, block.length);
        self.connection.send(&request).await?;
        let deadline = Instant::now() + self.connection.op_timeout();

        loop {
            let message = match self.connection.receive_until(deadline).await? {
                Frame::KeepAlive => continue,
                Frame::Message(message) => message,
            };

            match message.kind() {
                Some(MessageId::Piece) => {
                    let piece = match message.as_piece() {
                        Ok(piece) => piece,
                        Err(e) => {
                            warn!("Discarding malformed piece message from {}: {}", self.peer_addr(), e);
                            continue;
                        }
                    };
                    if piece.index != block.index
                        || piece.begin != block.begin
                        || !buffer.fits(piece.begin, piece.data.len())
                    {
                        debug!(
                            "Discarding unexpected block (piece {}, offset {}, {} bytes) from peer: {}",
                            piece.index,
                            piece.begin,
                            piece.data.len(),
                            self.peer_addr()
                        );
                        continue;
                    }
                    return buffer.write_block(piece.begin, &piece.data);
                }
                Some(MessageId::Choke) => self.update_choke(&message),
                Some(MessageId::Unchoke) => {
                    let was_choked = self.state.peer_choking;
                    self.update_choke(&message);
                    if was_choked {
                        debug!(
                            "Re-sending request for piece {} block {} to peer: {}",
                            block.index,
                            block.begin,
                            self.peer_addr()
                        );
                        self.connection.send(&request).await?;
                    }
                }
                _ => trace!("Ignoring message id {} from peer: {}", message.id, self.peer_addr()),
            }
        }
    }

    fn update_choke(&mut self, message: &Message) {
        match message.kind() {
            Some(MessageId::Choke) => {
                debug!("Choked by peer: {}", self.peer_addr());
                self.state.peer_choking = true;
            }
            Some(MessageId::Unchoke) => self.state.peer_choking = false,
            _ => {}
        }
    }
}
