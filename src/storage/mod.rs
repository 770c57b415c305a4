//! Storage module
//!
//! Piece assembly and verification, and the output file pieces are written to.

pub mod file;
pub mod piece;

pub use file::OutputFile;
pub use piece::{block_count, plan_blocks, verify_piece, BlockRequest, PieceBuffer, BLOCK_SIZE};
