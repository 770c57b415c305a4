//! Torrent file parser
//!
//! Handles parsing of .torrent files and extracting metadata. The info hash
//! is taken over the exact bytes of the `info` value as they appear in the
//! file, so the parser remembers where that value starts and ends.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::error::{TorrentError, TorrentResult};
use crate::torrent::info::TorrentInfo;

/// Parser for .torrent files
pub struct TorrentParser;

impl TorrentParser {
    /// Parse a .torrent file from bytes
    pub fn parse_bytes(data: &[u8]) -> TorrentResult<TorrentInfo> {
        debug!("Parsing torrent file from {} bytes", data.len());

        let (root, info_span) = Self::parse_root(data)?;
        let (info_start, info_end) = info_span
            .ok_or_else(|| TorrentError::metadata_error_with_field("Missing info dictionary", "info"))?;

        let announce = Self::get_string(&root, b"announce")?;
        let info_dict = root
            .get(b"info".as_slice())
            .and_then(|v| v.as_dict())
            .ok_or_else(|| TorrentError::metadata_error_with_field("Info must be a dictionary", "info"))?;

        if info_dict.contains_key(b"files".as_slice()) {
            return Err(TorrentError::metadata_error_with_field(
                "Multi-file torrents are not supported",
                "files",
            ));
        }

        let name = Self::get_string(info_dict, b"name")?;
        let length = Self::get_int(info_dict, b"length")?;
        let piece_length = Self::get_int(info_dict, b"piece length")?;
        let piece_length = u32::try_from(piece_length).map_err(|_| {
            TorrentError::metadata_error_with_field(format!("Piece length {} out of range", piece_length), "piece length")
        })?;
        let pieces = info_dict
            .get(b"pieces".as_slice())
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| TorrentError::metadata_error_with_field("Missing pieces field", "pieces"))?;

        let info_hash = TorrentInfo::generate_info_hash(&data[info_start..info_end]);
        let torrent = TorrentInfo::new(announce, name, length, piece_length, pieces, info_hash)?;

        info!("Parsed torrent '{}' ({} pieces, info hash {})", torrent.name, torrent.piece_count(), torrent.info_hash_hex());
        Ok(torrent)
    }

    /// Parse a .torrent file from a file path
    pub fn parse_file(path: &Path) -> TorrentResult<TorrentInfo> {
        info!("Loading torrent file from: {}", path.display());

        let data = std::fs::read(path).map_err(|e| {
            error!("Failed to read torrent file '{}': {}", path.display(), e);
            TorrentError::io_error_full("Failed to read torrent file", path.display().to_string(), e.to_string())
        })?;

        debug!("Read {} bytes from torrent file", data.len());
        Self::parse_bytes(&data)
    }

    /// Parse the top-level dictionary, remembering the byte span of `info`
    #[allow(clippy::type_complexity)]
    fn parse_root(data: &[u8]) -> TorrentResult<(BTreeMap<Vec<u8>, BencodeValue>, Option<(usize, usize)>)> {
        if data.first() != Some(&b'd') {
            return Err(TorrentError::metadata_error("Root must be a dictionary"));
        }

        let mut idx = 1;
        let mut dict = BTreeMap::new();
        let mut info_span = None;

        while idx < data.len() && data[idx] != b'e' {
            let key = match Self::parse_value(data, &mut idx)? {
                BencodeValue::Bytes(b) => b,
                _ => return Err(TorrentError::metadata_error("Dictionary key must be bytes")),
            };
            let start = idx;
            let value = Self::parse_value(data, &mut idx)?;
            if key == b"info" {
                info_span = Some((start, idx));
            }
            dict.insert(key, value);
        }

        if idx >= data.len() {
            return Err(TorrentError::metadata_error("Unterminated root dictionary"));
        }
        if idx + 1 != data.len() {
            warn!("Ignoring {} trailing bytes after torrent dictionary", data.len() - idx - 1);
        }

        Ok((dict, info_span))
    }

    fn parse_value(data: &[u8], idx: &mut usize) -> TorrentResult<BencodeValue> {
        let byte = *data
            .get(*idx)
            .ok_or_else(|| TorrentError::metadata_error("Unexpected end of data"))?;

        match byte {
            b'i' => {
                // Integer
                *idx += 1;
                let end = Self::find(data, *idx, b'e')
                    .ok_or_else(|| TorrentError::metadata_error("Unterminated integer"))?;
                let value = std::str::from_utf8(&data[*idx..end])
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| TorrentError::metadata_error("Invalid integer"))?;
                *idx = end + 1;
                Ok(BencodeValue::Int(value))
            }
            b'l' => {
                // List
                *idx += 1;
                let mut list = Vec::new();
                while *idx < data.len() && data[*idx] != b'e' {
                    list.push(Self::parse_value(data, idx)?);
                }
                if *idx >= data.len() {
                    return Err(TorrentError::metadata_error("Unterminated list"));
                }
                *idx += 1; // skip 'e'
                Ok(BencodeValue::List(list))
            }
            b'd' => {
                // Dictionary
                *idx += 1;
                let mut dict = BTreeMap::new();
                while *idx < data.len() && data[*idx] != b'e' {
                    let key = match Self::parse_value(data, idx)? {
                        BencodeValue::Bytes(b) => b,
                        _ => return Err(TorrentError::metadata_error("Dictionary key must be bytes")),
                    };
                    let value = Self::parse_value(data, idx)?;
                    dict.insert(key, value);
                }
                if *idx >= data.len() {
                    return Err(TorrentError::metadata_error("Unterminated dictionary"));
                }
                *idx += 1; // skip 'e'
                Ok(BencodeValue::Dict(dict))
            }
            b'0'..=b'9' => {
                // Byte string
                let colon = Self::find(data, *idx, b':')
                    .ok_or_else(|| TorrentError::metadata_error("Unterminated string length"))?;
                let length = std::str::from_utf8(&data[*idx..colon])
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| TorrentError::metadata_error("Invalid string length"))?;
                let start = colon + 1;
                let end = start
                    .checked_add(length)
                    .filter(|&end| end <= data.len())
                    .ok_or_else(|| TorrentError::metadata_error("String runs past end of data"))?;
                *idx = end;
                Ok(BencodeValue::Bytes(data[start..end].to_vec()))
            }
            _ => Err(TorrentError::metadata_error(format!("Unknown bencode type: {}", byte))),
        }
    }

    fn find(data: &[u8], from: usize, needle: u8) -> Option<usize> {
        data[from..].iter().position(|&b| b == needle).map(|p| p + from)
    }

    fn get_string(dict: &BTreeMap<Vec<u8>, BencodeValue>, key: &[u8]) -> TorrentResult<String> {
        let field = String::from_utf8_lossy(key).to_string();
        dict.get(key)
            .and_then(|v| v.as_bytes())
            .map(|b| String::from_utf8_lossy(b).to_string())
            .ok_or_else(|| TorrentError::metadata_error_with_field(format!("Missing {} field", field), field))
    }

    fn get_int(dict: &BTreeMap<Vec<u8>, BencodeValue>, key: &[u8]) -> TorrentResult<u64> {
        let field = String::from_utf8_lossy(key).to_string();
        let value = dict
            .get(key)
            .and_then(|v| v.as_int())
            .ok_or_else(|| TorrentError::metadata_error_with_field(format!("Missing {} field", field), field.clone()))?;
        u64::try_from(value)
            .map_err(|_| TorrentError::metadata_error_with_field(format!("Negative {} value", field), field))
    }
}

/// Bencode value
#[derive(Debug, Clone)]
enum BencodeValue {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<BencodeValue>),
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    fn as_int(&self) -> Option<i64> {
        match self {
            BencodeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    #[cfg(test)]
    fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(l) => Some(l),
            _ => None,
        }
    }

    fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BencodeValue>> {
        match self {
            BencodeValue::Dict(d) => Some(d),
            _ => None,
        }
    }
}
