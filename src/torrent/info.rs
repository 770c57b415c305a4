//! Torrent information structures
//!
//! Provides the validated, read-only view of a single-file torrent that the
//! rest of the downloader works from.

use sha1::{Digest, Sha1};

use crate::error::{TorrentError, TorrentResult};

/// Size of one SHA-1 digest in the `pieces` table
pub const SHA1_HASH_SIZE: usize = 20;

/// High-level torrent information
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    /// Tracker announce URL
    pub announce: String,
    /// SHA1 hash of the bencoded info dictionary
    pub info_hash: [u8; 20],
    /// Size of each piece in bytes (the last piece may be shorter)
    pub piece_length: u32,
    /// List of piece hashes (each is a 20-byte SHA1 hash)
    pub pieces: Vec<[u8; 20]>,
    /// Suggested file name
    pub name: String,
    /// Total file size in bytes
    pub length: u64,
}

impl TorrentInfo {
    /// Build torrent info from descriptor fields, checking that they agree
    pub fn new(
        announce: String,
        name: String,
        length: u64,
        piece_length: u32,
        pieces_bytes: &[u8],
        info_hash: [u8; 20],
    ) -> TorrentResult<Self> {
        if piece_length == 0 {
            return Err(TorrentError::metadata_error_with_field("Piece length must be positive", "piece length"));
        }
        if length == 0 {
            return Err(TorrentError::metadata_error_with_field("File length must be positive", "length"));
        }

        let pieces = Self::parse_piece_hashes(pieces_bytes)?;
        let expected = Self::expected_piece_count(length, piece_length);
        if pieces.len() as u64 != expected {
            return Err(TorrentError::metadata_error_with_field(
                format!("Expected {} piece hashes, found {}", expected, pieces.len()),
                "pieces",
            ));
        }

        Ok(Self {
            announce,
            info_hash,
            piece_length,
            pieces,
            name,
            length,
        })
    }

    /// Number of pieces a file of `length` bytes splits into
    pub fn expected_piece_count(length: u64, piece_length: u32) -> u64 {
        length.div_ceil(piece_length as u64)
    }

    /// Total size of the file in bytes
    pub fn total_size(&self) -> u64 {
        self.length
    }

    /// Get number of pieces in torrent
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Get info hash as a hex string
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }

    /// Generate info hash from info dictionary bytes
    pub fn generate_info_hash(info_dict_bytes: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(info_dict_bytes);
        hasher.finalize().into()
    }

    /// Parse piece hashes from concatenated bytes in torrent file
    pub fn parse_piece_hashes(pieces_bytes: &[u8]) -> TorrentResult<Vec<[u8; 20]>> {
        if pieces_bytes.len() % SHA1_HASH_SIZE != 0 {
            return Err(TorrentError::metadata_error_with_field(
                format!("Pieces field length must be a multiple of 20, got {}", pieces_bytes.len()),
                "pieces",
            ));
        }

        Ok(pieces_bytes
            .chunks_exact(SHA1_HASH_SIZE)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect())
    }

    /// Get piece hash for a specific piece index
    pub fn piece_hash(&self, index: u32) -> Option<&[u8; 20]> {
        self.pieces.get(index as usize)
    }

    /// Length of one piece; only the last piece can be shorter
    pub fn piece_size(&self, index: u32) -> u32 {
        let start = index as u64 * self.piece_length as u64;
        let remaining = self.length.saturating_sub(start);
        remaining.min(self.piece_length as u64) as u32
    }

    /// Byte offset of a piece within the file
    pub fn piece_offset(&self, index: u32) -> u64 {
        index as u64 * self.piece_length as u64
    }

    /// Get byte range for a specific piece
    pub fn piece_range(&self, index: u32) -> Option<(u64, u64)> {
        if index as usize >= self.pieces.len() {
            return None;
        }
        let start = self.piece_offset(index);
        Some((start, start + self.piece_size(index) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(length: u64, piece_length: u32) -> TorrentInfo {
        let count = TorrentInfo::expected_piece_count(length, piece_length) as usize;
        TorrentInfo::new(
            "http://tracker.example.com/announce".to_string(),
            "test.bin".to_string(),
            length,
            piece_length,
            &vec![0u8; count * 20],
            [1u8; 20],
        )
        .unwrap()
    }

    #[test]
    fn test_four_piece_torrent() {
        let info = info(1_048_576, 262_144);
        assert_eq!(info.piece_count(), 4);
        assert_eq!(info.total_size(), 1_048_576);
        assert_eq!(info.info_hash_hex(), hex::encode([1u8; 20]));
    }

    #[test]
    fn test_short_digest_table_rejected() {
        let result = TorrentInfo::new(
            "http://tracker.example.com/announce".to_string(),
            "test.bin".to_string(),
            1_048_576,
            262_144,
            &[0u8; 60],
            [1u8; 20],
        );
        assert!(matches!(result, Err(TorrentError::MetadataError { .. })));
    }

    #[test]
    fn test_zero_piece_length_rejected() {
        let result = TorrentInfo::new(String::new(), "x".to_string(), 10, 0, &[], [0u8; 20]);
        assert!(matches!(result, Err(TorrentError::MetadataError { .. })));
    }

    #[test]
    fn test_parse_piece_hashes_valid() {
        let hashes: Vec<u8> = (0..40).map(|i| i as u8).collect();
        let result = TorrentInfo::parse_piece_hashes(&hashes).unwrap();
        assert_eq!(result.len(), 2);
        let expected: [u8; 20] = (0..20).map(|i| i as u8).collect::<Vec<u8>>().try_into().unwrap();
        assert_eq!(result[0], expected);
    }

    #[test]
    fn test_parse_piece_hashes_invalid() {
        let hashes = vec![1u8; 21]; // Not a multiple of 20
        assert!(TorrentInfo::parse_piece_hashes(&hashes).is_err());
    }

    #[test]
    fn test_piece_size_last_piece_shorter() {
        let info = info(1500, 1024);
        assert_eq!(info.piece_size(0), 1024);
        assert_eq!(info.piece_size(1), 476);
    }

    #[test]
    fn test_piece_size_within_bounds_for_all_pieces() {
        for (length, piece_length) in [(1u64, 16u32), (16, 16), (17, 16), (1_048_576, 262_144), (1_000_001, 32_768)] {
            let info = info(length, piece_length);
            let last = info.piece_count() as u32 - 1;
            for index in 0..last {
                assert_eq!(info.piece_size(index), piece_length);
            }
            let last_size = info.piece_size(last);
            assert_eq!(last_size as u64, length - last as u64 * piece_length as u64);
            assert!(last_size > 0 && last_size <= piece_length);
        }
    }

    #[test]
    fn test_piece_range() {
        let info = info(1500, 1024);
        assert_eq!(info.piece_range(0), Some((0, 1024)));
        assert_eq!(info.piece_range(1), Some((1024, 1500))); // Last piece is shorter
        assert_eq!(info.piece_range(2), None);
    }

    #[test]
    fn test_generate_info_hash() {
        // SHA-1 of the empty string
        assert_eq!(
            hex::encode(TorrentInfo::generate_info_hash(b"")),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }
}
