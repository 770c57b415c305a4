//! Torrent file handling module
//!
//! This module provides functionality for parsing and working with .torrent files.

pub mod info;
pub mod parser;

pub use info::{TorrentInfo, SHA1_HASH_SIZE};
pub use parser::TorrentParser;
