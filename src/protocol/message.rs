//! BitTorrent protocol messages
//!
//! A message is an ID byte plus an opaque payload. The typed accessors below
//! interpret payloads for the consumers that need them; the frame codec never
//! looks inside.

use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::error::{TorrentError, TorrentResult};

/// BitTorrent message IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
}

impl TryFrom<u8> for MessageId {
    type Error = TorrentError;

    fn try_from(value: u8) -> TorrentResult<Self> {
        match value {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            _ => Err(TorrentError::session_error(format!("Unknown message ID: {}", value))),
        }
    }
}

/// Block payload carried by a `piece` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceBlock {
    pub index: u32,
    pub begin: u32,
    pub data: Vec<u8>,
}

/// BitTorrent protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw message ID; unknown IDs are kept as-is
    pub id: u8,
    /// Everything after the ID byte
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message from a raw ID and payload
    pub fn new(id: u8, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn choke() -> Self {
        Self::new(MessageId::Choke as u8, Vec::new())
    }

    pub fn unchoke() -> Self {
        Self::new(MessageId::Unchoke as u8, Vec::new())
    }

    pub fn interested() -> Self {
        Self::new(MessageId::Interested as u8, Vec::new())
    }

    pub fn not_interested() -> Self {
        Self::new(MessageId::NotInterested as u8, Vec::new())
    }

    /// Announce a completed piece
    pub fn have(piece_index: u32) -> Self {
        Self::new(MessageId::Have as u8, piece_index.to_be_bytes().to_vec())
    }

    pub fn bitfield(bitfield: Vec<u8>) -> Self {
        Self::new(MessageId::Bitfield as u8, bitfield)
    }

    /// Ask for `length` bytes of piece `index` starting at `begin`
    pub fn request(index: u32, begin: u32, length: u32) -> Self {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u32(index);
        buf.put_u32(begin);
        buf.put_u32(length);
        Self::new(MessageId::Request as u8, buf.to_vec())
    }

    /// Deliver block data for piece `index` at `begin`
    pub fn piece(index: u32, begin: u32, block: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(8 + block.len());
        buf.put_u32(index);
        buf.put_u32(begin);
        buf.put_slice(block);
        Self::new(MessageId::Piece as u8, buf.to_vec())
    }

    pub fn cancel(index: u32, begin: u32, length: u32) -> Self {
        let mut msg = Self::request(index, begin, length);
        msg.id = MessageId::Cancel as u8;
        msg
    }

    /// Known message kind, or None for IDs this client does not handle
    pub fn kind(&self) -> Option<MessageId> {
        MessageId::try_from(self.id).ok()
    }

    /// Length on the wire after the 4-byte prefix
    pub fn length(&self) -> u32 {
        1 + self.payload.len() as u32
    }

    /// Interpret the payload of a `piece` message
    pub fn as_piece(&self) -> TorrentResult<PieceBlock> {
        self.expect_kind(MessageId::Piece)?;
        if self.payload.len() < 8 {
            return Err(TorrentError::session_error(format!(
                "Piece message too short: expected at least 8 bytes, got {}",
                self.payload.len()
            )));
        }
        let mut buf = &self.payload[..];
        let index = buf.get_u32();
        let begin = buf.get_u32();
        trace!("Parsed piece payload: index={}, begin={}, block_len={}", index, begin, buf.len());
        Ok(PieceBlock {
            index,
            begin,
            data: buf.to_vec(),
        })
    }

    /// Interpret the payload of a `have` message
    pub fn as_have(&self) -> TorrentResult<u32> {
        self.expect_kind(MessageId::Have)?;
        if self.payload.len() != 4 {
            return Err(TorrentError::session_error(format!(
                "Have message has wrong length: expected 4 bytes, got {}",
                self.payload.len()
            )));
        }
        let mut buf = &self.payload[..];
        Ok(buf.get_u32())
    }

    /// Interpret the payload of a `request` message as (index, begin, length)
    pub fn as_request(&self) -> TorrentResult<(u32, u32, u32)> {
        self.expect_kind(MessageId::Request)?;
        if self.payload.len() != 12 {
            return Err(TorrentError::session_error(format!(
                "Request message has wrong length: expected 12 bytes, got {}",
                self.payload.len()
            )));
        }
        let mut buf = &self.payload[..];
        Ok((buf.get_u32(), buf.get_u32(), buf.get_u32()))
    }

    fn expect_kind(&self, expected: MessageId) -> TorrentResult<()> {
        if self.id != expected as u8 {
            return Err(TorrentError::session_error(format!(
                "Expected {:?} message, got ID {}",
                expected, self.id
            )));
        }
        Ok(())
    }
}
