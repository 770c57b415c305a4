//! BitTorrent protocol module
//!
//! Implements the BitTorrent peer wire protocol: handshake, messages and framing.

pub mod handshake;
pub mod message;
pub mod wire;

// Re-export main types
pub use handshake::{perform_handshake, Handshake, HANDSHAKE_LENGTH, PROTOCOL_LENGTH, PROTOCOL_STRING};
pub use message::{Message, MessageId, PieceBlock};
pub use wire::{decode_frame, encode_frame, read_frame, write_frame, Frame, MAX_FRAME_LENGTH};
