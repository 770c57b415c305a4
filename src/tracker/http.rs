//! HTTP tracker client
//!
//! Single announce request returning the compact peer list.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_bytes::ByteBuf;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{TorrentError, TorrentResult};
use crate::peer::{PeerAddr, COMPACT_PEER_SIZE};
use crate::torrent::TorrentInfo;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Bencoded announce response
#[derive(Debug, Deserialize)]
struct AnnounceResponse {
    #[serde(rename = "failure reason", default)]
    failure_reason: Option<String>,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    peers: Option<ByteBuf>,
}

/// Peers handed out by one announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
    /// Seconds the tracker wants between announces
    pub interval: u64,
    pub peers: Vec<PeerAddr>,
}

/// Announce parameters for a download that has not started yet
#[derive(Debug, Clone)]
pub struct AnnounceRequest<'a> {
    pub info_hash: &'a [u8; 20],
    pub peer_id: &'a [u8; 20],
    pub port: u16,
    pub left: u64,
}

impl<'a> AnnounceRequest<'a> {
    pub fn new(torrent: &'a TorrentInfo, peer_id: &'a [u8; 20], port: u16) -> Self {
        Self {
            info_hash: &torrent.info_hash,
            peer_id,
            port,
            left: torrent.total_size(),
        }
    }
}

/// Client for one HTTP(S) tracker
#[derive(Debug, Clone)]
pub struct TrackerClient {
    client: Client,
    announce: Url,
}

impl TrackerClient {
    /// Create a client for `announce`; anything but http(s) is rejected
    pub fn new(announce: &str) -> TorrentResult<Self> {
        let url = Url::parse(announce).map_err(|e| {
            TorrentError::tracker_error_full("Invalid announce URL", announce, e.to_string())
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(TorrentError::tracker_error_full(
                "Unsupported tracker protocol",
                announce,
                format!("scheme '{}'", url.scheme()),
            ));
        }

        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client, announce: url })
    }

    /// Announce ourselves and fetch the peer list
    pub async fn announce(&self, request: &AnnounceRequest<'_>) -> TorrentResult<Announce> {
        let url = build_announce_url(self.announce.as_str(), request);
        info!("Announcing to tracker: {}", self.announce);
        debug!("Announce URL: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TorrentError::tracker_error_full(
                "Tracker returned an error status",
                self.announce.as_str(),
                status.to_string(),
            ));
        }

        let body = response.bytes().await?;
        let announce = parse_announce_response(&body).map_err(|e| match e {
            TorrentError::TrackerError { message, url: None, source } => TorrentError::TrackerError {
                message,
                url: Some(self.announce.to_string()),
                source,
            },
            other => other,
        })?;

        info!("Tracker returned {} peers (interval {}s)", announce.peers.len(), announce.interval);
        Ok(announce)
    }

    pub fn url(&self) -> &Url {
        &self.announce
    }
}

/// Build the full announce URL with every binary field percent-encoded
pub fn build_announce_url(announce: &str, request: &AnnounceRequest<'_>) -> String {
    let query = format!(
        "info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1",
        percent_encode_binary(request.info_hash),
        percent_encode_binary(request.peer_id),
        request.port,
        request.left
    );

    let mut url = announce.to_string();
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&query);
    url
}

/// Percent-encode raw bytes, leaving only RFC 3986 unreserved characters as is
fn percent_encode_binary(data: &[u8]) -> String {
    const HEX_DIGITS: &[u8] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(data.len() * 3);

    for &byte in data {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            encoded.push(HEX_DIGITS[(byte & 0x0F) as usize] as char);
        }
    }

    encoded
}

/// Decode a bencoded announce response body
pub fn parse_announce_response(body: &[u8]) -> TorrentResult<Announce> {
    let response: AnnounceResponse = serde_bencode::from_bytes(body)?;

    if let Some(reason) = response.failure_reason {
        warn!("Tracker refused announce: {}", reason);
        return Err(TorrentError::tracker_error(format!("Tracker failure: {}", reason)));
    }

    let peers = response
        .peers
        .ok_or_else(|| TorrentError::tracker_error("Tracker response has no 'peers' field"))?;

    Ok(Announce {
        interval: response.interval.unwrap_or(0),
        peers: parse_compact_peers(&peers),
    })
}

/// Split a compact peer string into addresses; a trailing partial record is dropped
pub fn parse_compact_peers(data: &[u8]) -> Vec<PeerAddr> {
    if data.len() % COMPACT_PEER_SIZE != 0 {
        warn!(
            "Compact peer list length {} is not a multiple of {}, ignoring the tail",
            data.len(),
            COMPACT_PEER_SIZE
        );
    }
    data.chunks_exact(COMPACT_PEER_SIZE)
        .filter_map(PeerAddr::from_compact)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const INFO_HASH: [u8; 20] = [
        0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf1, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x12, 0x34, 0x56,
        0x78, 0x9a,
    ];
    const PEER_ID: [u8; 20] = *b"-TF0001-abcdefghij12";

    fn request() -> AnnounceRequest<'static> {
        AnnounceRequest {
            info_hash: &INFO_HASH,
            peer_id: &PEER_ID,
            port: 6881,
            left: 1_048_576,
        }
    }

    #[test]
    fn test_percent_encode_binary() {
        assert_eq!(percent_encode_binary(&[0x12, 0x34, b'a', b'-', 0xff]), "%124a-%FF");
        assert_eq!(percent_encode_binary(b" /?&"), "%20%2F%3F%26");
    }

    #[test]
    fn test_build_announce_url() {
        let url = build_announce_url("http://tracker.example.com/announce", &request());
        assert_eq!(
            url,
            "http://tracker.example.com/announce?info_hash=%124Vx%9A%BC%DE%F1%23Eg%89%AB%CD%EF%124Vx%9A\
             &peer_id=-TF0001-abcdefghij12&port=6881&uploaded=0&downloaded=0&left=1048576&compact=1"
        );
    }

    #[test]
    fn test_build_announce_url_keeps_existing_query() {
        let url = build_announce_url("http://tracker.example.com/announce?passkey=abc", &request());
        assert!(url.starts_with("http://tracker.example.com/announce?passkey=abc&info_hash="));
    }

    #[test]
    fn test_parse_compact_peers() {
        let data = [192, 168, 1, 1, 0x1A, 0xE1, 10, 0, 0, 2, 0xC8, 0xD5];
        let peers = parse_compact_peers(&data);
        assert_eq!(
            peers,
            vec![
                PeerAddr::new(Ipv4Addr::new(192, 168, 1, 1), 6881),
                PeerAddr::new(Ipv4Addr::new(10, 0, 0, 2), 51413),
            ]
        );
        assert_eq!(parse_compact_peers(&data[..8]).len(), 1);
        assert!(parse_compact_peers(&[]).is_empty());
    }

    #[test]
    fn test_parse_announce_response() {
        let mut body = b"d8:intervali1800e5:peers12:".to_vec();
        body.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1, 127, 0, 0, 1, 0x1A, 0xE2]);
        body.push(b'e');

        let announce = parse_announce_response(&body).unwrap();
        assert_eq!(announce.interval, 1800);
        assert_eq!(announce.peers.len(), 2);
        assert_eq!(announce.peers[1].port, 6882);
    }

    #[test]
    fn test_parse_announce_failure_reason() {
        let err = parse_announce_response(b"d14:failure reason17:torrent not founde").unwrap_err();
        assert!(matches!(err, TorrentError::TrackerError { .. }));
        assert!(err.to_string().contains("torrent not found"));
    }

    #[test]
    fn test_parse_announce_garbage() {
        assert!(parse_announce_response(b"<html>nope</html>").is_err());
        assert!(parse_announce_response(b"d8:intervali60ee").is_err());
    }

    #[test]
    fn test_rejects_non_http_tracker() {
        assert!(matches!(
            TrackerClient::new("udp://tracker.example.com:6969/announce"),
            Err(TorrentError::TrackerError { .. })
        ));
        assert!(TrackerClient::new("not a url").is_err());
        assert!(TrackerClient::new("https://tracker.example.com/announce").is_ok());
    }

    #[tokio::test]
    async fn test_announce_against_local_tracker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let mut body = b"d8:intervali900e5:peers6:".to_vec();
            body.extend_from_slice(&[10, 0, 0, 7, 0x1A, 0xE1]);
            body.push(b'e');
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        let client = TrackerClient::new(&format!("http://127.0.0.1:{}/announce", port)).unwrap();
        let announce = client.announce(&request()).await.unwrap();
        assert_eq!(announce.interval, 900);
        assert_eq!(announce.peers, vec![PeerAddr::new(Ipv4Addr::new(10, 0, 0, 7), 6881)]);

        let request_text = server.await.unwrap();
        assert!(request_text.starts_with("GET /announce?info_hash=%124Vx%9A"));
        assert!(request_text.contains("&compact=1"));
    }
}
