//! Piece storage module
//!
//! Block planning, in-memory assembly and SHA-1 verification of single pieces.

use sha1::{Digest, Sha1};

use crate::error::{TorrentError, TorrentResult};

/// Fixed block size for requests (16 KiB)
pub const BLOCK_SIZE: u32 = 16 * 1024;

/// Represents a request for one block within a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    /// Piece index this block belongs to
    pub index: u32,
    /// Offset within the piece
    pub begin: u32,
    /// Length of the block
    pub length: u32,
}

/// Number of blocks needed to cover a piece
pub fn block_count(piece_size: u32) -> u32 {
    piece_size.div_ceil(BLOCK_SIZE)
}

/// Split a piece into sequential block requests
///
/// The returned ranges cover `[0, piece_size)` exactly, in order, each at
/// most [`BLOCK_SIZE`] long.
pub fn plan_blocks(index: u32, piece_size: u32) -> Vec<BlockRequest> {
    (0..block_count(piece_size))
        .map(|b| {
            let begin = b * BLOCK_SIZE;
            BlockRequest {
                index,
                begin,
                length: BLOCK_SIZE.min(piece_size - begin),
            }
        })
        .collect()
}

/// Compare the SHA-1 digest of `data` against the expected digest
pub fn verify_piece(data: &[u8], expected_hash: &[u8; 20]) -> bool {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().as_slice() == expected_hash
}

/// Buffer a single piece is assembled in
#[derive(Debug)]
pub struct PieceBuffer {
    index: u32,
    data: Vec<u8>,
}

impl PieceBuffer {
    /// Allocate a zeroed buffer of exactly `size` bytes
    pub fn new(index: u32, size: u32) -> Self {
        Self {
            index,
            data: vec![0u8; size as usize],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `len` bytes at `begin` fit inside the buffer
    pub fn fits(&self, begin: u32, len: usize) -> bool {
        (begin as usize)
            .checked_add(len)
            .is_some_and(|end| end <= self.data.len())
    }

    /// Copy block data in at `begin`
    pub fn write_block(&mut self, begin: u32, block: &[u8]) -> TorrentResult<()> {
        if !self.fits(begin, block.len()) {
            return Err(TorrentError::session_error(format!(
                "Block at offset {} ({} bytes) overflows piece {} of {} bytes",
                begin,
                block.len(),
                self.index,
                self.data.len()
            )));
        }
        let begin = begin as usize;
        self.data[begin..begin + block.len()].copy_from_slice(block);
        Ok(())
    }

    /// Check the assembled bytes and hand them over if they match
    pub fn into_verified(self, expected_hash: &[u8; 20]) -> TorrentResult<Vec<u8>> {
        if !verify_piece(&self.data, expected_hash) {
            return Err(TorrentError::verification_error_for_piece("piece hash mismatch", self.index));
        }
        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha1(data: &[u8]) -> [u8; 20] {
        Sha1::digest(data).into()
    }

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(1), 1);
        assert_eq!(block_count(BLOCK_SIZE), 1);
        assert_eq!(block_count(BLOCK_SIZE + 1), 2);
        assert_eq!(block_count(262_144), 16);
    }

    #[test]
    fn test_plan_blocks_covers_piece_exactly() {
        for piece_size in [1u32, 16, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, 262_144, 100_000] {
            let blocks = plan_blocks(5, piece_size);
            assert_eq!(blocks.len() as u32, block_count(piece_size));

            let mut next = 0;
            for block in &blocks {
                assert_eq!(block.index, 5);
                assert_eq!(block.begin, next);
                assert!(block.length > 0 && block.length <= BLOCK_SIZE);
                next = block.begin + block.length;
            }
            assert_eq!(next, piece_size);
        }
    }

    #[test]
    fn test_verify_piece() {
        let data = b"0123456789abcdef";
        assert!(verify_piece(data, &sha1(data)));
        assert!(!verify_piece(data, &[0u8; 20]));
    }

    #[test]
    fn test_verify_piece_is_idempotent() {
        let data = vec![7u8; 1000];
        let good = sha1(&data);
        let bad = [0xaa; 20];
        for _ in 0..3 {
            assert!(verify_piece(&data, &good));
            assert!(!verify_piece(&data, &bad));
        }
    }

    #[test]
    fn test_piece_buffer_assembly() {
        let mut buffer = PieceBuffer::new(0, 8);
        buffer.write_block(4, b"5678").unwrap();
        buffer.write_block(0, b"1234").unwrap();

        let data = buffer.into_verified(&sha1(b"12345678")).unwrap();
        assert_eq!(data, b"12345678");
    }

    #[test]
    fn test_piece_buffer_rejects_overflow() {
        let mut buffer = PieceBuffer::new(0, 8);
        assert!(buffer.write_block(6, b"abc").is_err());
        assert!(buffer.write_block(u32::MAX, b"a").is_err());
        assert!(!buffer.fits(9, 0));
    }

    #[test]
    fn test_piece_buffer_hash_mismatch() {
        let mut buffer = PieceBuffer::new(3, 4);
        buffer.write_block(0, b"abcd").unwrap();

        let err = buffer.into_verified(&sha1(b"abce")).unwrap_err();
        assert!(matches!(err, TorrentError::VerificationError { piece: Some(3), .. }));
    }
}
