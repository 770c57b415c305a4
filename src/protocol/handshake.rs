//! BitTorrent handshake protocol
//!
//! Handles the initial handshake between peers. The handshake is a fixed
//! 68-byte record sent without the length-prefix framing used afterwards.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

use crate::error::{HandshakeFailure, TorrentError, TorrentResult};

/// BitTorrent protocol identifier string
pub const PROTOCOL_STRING: &str = "BitTorrent protocol";

/// Length of the protocol string
pub const PROTOCOL_LENGTH: u8 = 19;

/// Total size of a handshake on the wire
pub const HANDSHAKE_LENGTH: usize = 49 + PROTOCOL_LENGTH as usize;

/// Client prefix for generated peer IDs
pub const PEER_ID_PREFIX: &[u8; 8] = b"-TF0001-";

/// BitTorrent handshake message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Torrent info hash
    pub info_hash: [u8; 20],
    /// Sender's peer ID
    pub peer_id: [u8; 20],
}

impl Handshake {
    /// Create a new handshake with info_hash and peer_id
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    /// Generate a random peer ID with the client prefix
    pub fn generate_peer_id() -> [u8; 20] {
        let mut peer_id = [0u8; 20];
        peer_id[..8].copy_from_slice(PEER_ID_PREFIX);
        peer_id[8..].copy_from_slice(&rand::random::<[u8; 12]>());
        info!("Generated new peer ID: {}", hex::encode(peer_id));
        peer_id
    }

    /// Serialize the handshake to bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LENGTH);
        buf.put_u8(PROTOCOL_LENGTH);
        buf.put_slice(PROTOCOL_STRING.as_bytes());
        buf.put_slice(&[0u8; 8]); // Reserved bytes
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        trace!("Handshake serialized: {} bytes", buf.len());
        buf.to_vec()
    }

    /// Deserialize a handshake from bytes
    ///
    /// Checks the length byte and the protocol literal; the info hash is
    /// checked separately by [`Handshake::validate`].
    pub fn deserialize(data: &[u8]) -> TorrentResult<Self> {
        if data.len() < HANDSHAKE_LENGTH {
            return Err(TorrentError::handshake_error(HandshakeFailure::Truncated));
        }

        if data[0] != PROTOCOL_LENGTH || &data[1..20] != PROTOCOL_STRING.as_bytes() {
            return Err(TorrentError::handshake_error(HandshakeFailure::ProtocolMismatch));
        }

        // Reserved bytes (data[20..28]) are ignored
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self { info_hash, peer_id })
    }

    /// Validate the handshake info_hash
    pub fn validate(&self, expected_info_hash: &[u8; 20]) -> TorrentResult<()> {
        if self.info_hash != *expected_info_hash {
            warn!("Handshake validation failed: info hash mismatch");
            warn!("  Expected: {}", hex::encode(expected_info_hash));
            warn!("  Got:      {}", hex::encode(self.info_hash));
            return Err(TorrentError::handshake_error(HandshakeFailure::InfoHashMismatch));
        }
        Ok(())
    }
}

/// Exchange handshakes over a freshly opened stream
///
/// Returns the remote handshake; its peer ID is not checked against anything.
pub async fn perform_handshake<S>(stream: &mut S, info_hash: [u8; 20], peer_id: [u8; 20]) -> TorrentResult<Handshake>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ours = Handshake::new(info_hash, peer_id);
    stream.write_all(&ours.serialize()).await?;
    stream.flush().await?;

    let mut response = [0u8; HANDSHAKE_LENGTH];
    if let Err(e) = stream.read_exact(&mut response).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(TorrentError::handshake_error(HandshakeFailure::Truncated));
        }
        return Err(e.into());
    }

    let theirs = Handshake::deserialize(&response)?;
    theirs.validate(&info_hash)?;

    debug!("Remote peer ID: {}", hex::encode(theirs.peer_id));
    Ok(theirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_HASH: [u8; 20] = [1u8; 20];

    async fn handshake_against(response: Vec<u8>) -> TorrentResult<Handshake> {
        let (mut client, mut server) = tokio::io::duplex(256);
        let responder = tokio::spawn(async move {
            let mut request = [0u8; HANDSHAKE_LENGTH];
            server.read_exact(&mut request).await.unwrap();
            server.write_all(&response).await.unwrap();
            request
        });

        let result = perform_handshake(&mut client, INFO_HASH, [2u8; 20]).await;
        let request = responder.await.unwrap();
        assert_eq!(request.to_vec(), Handshake::new(INFO_HASH, [2u8; 20]).serialize());
        result
    }

    #[test]
    fn test_handshake_layout() {
        let serialized = Handshake::new([1u8; 20], [2u8; 20]).serialize();
        assert_eq!(serialized.len(), 68);
        assert_eq!(serialized[0], 19);
        assert_eq!(&serialized[1..20], b"BitTorrent protocol");
        assert_eq!(&serialized[20..28], &[0u8; 8]);
        assert_eq!(&serialized[28..48], &[1u8; 20]);
        assert_eq!(&serialized[48..68], &[2u8; 20]);
    }

    #[test]
    fn test_handshake_serialize_deserialize() {
        let handshake = Handshake::new([1u8; 20], [2u8; 20]);
        let deserialized = Handshake::deserialize(&handshake.serialize()).unwrap();
        assert_eq!(deserialized, handshake);
    }

    #[test]
    fn test_generate_peer_id() {
        let peer_id = Handshake::generate_peer_id();
        assert_eq!(&peer_id[..8], PEER_ID_PREFIX);
        assert_eq!(peer_id.len(), 20);
    }

    #[tokio::test]
    async fn test_accepts_any_remote_peer_id() {
        let response = Handshake::new(INFO_HASH, *b"-XX9999-abcdefghijkl").serialize();
        let theirs = handshake_against(response).await.unwrap();
        assert_eq!(&theirs.peer_id, b"-XX9999-abcdefghijkl");
    }

    #[tokio::test]
    async fn test_rejects_one_byte_protocol_change() {
        let mut response = Handshake::new(INFO_HASH, [3u8; 20]).serialize();
        response[11] ^= 0x20; // "BitTorrent Protocol"

        let err = handshake_against(response).await.unwrap_err();
        assert!(matches!(
            err,
            TorrentError::HandshakeError { reason: HandshakeFailure::ProtocolMismatch, .. }
        ));
    }

    #[tokio::test]
    async fn test_rejects_wrong_length_byte() {
        let mut response = Handshake::new(INFO_HASH, [3u8; 20]).serialize();
        response[0] = 18;

        let err = handshake_against(response).await.unwrap_err();
        assert!(matches!(
            err,
            TorrentError::HandshakeError { reason: HandshakeFailure::ProtocolMismatch, .. }
        ));
    }

    #[tokio::test]
    async fn test_rejects_info_hash_mismatch() {
        let response = Handshake::new([9u8; 20], [3u8; 20]).serialize();

        let err = handshake_against(response).await.unwrap_err();
        assert!(matches!(
            err,
            TorrentError::HandshakeError { reason: HandshakeFailure::InfoHashMismatch, .. }
        ));
    }

    #[tokio::test]
    async fn test_truncated_response() {
        let (mut client, mut server) = tokio::io::duplex(256);
        tokio::spawn(async move {
            let mut request = [0u8; HANDSHAKE_LENGTH];
            server.read_exact(&mut request).await.unwrap();
            server.write_all(&request[..30]).await.unwrap();
            // server dropped here, closing the stream
        });

        let err = perform_handshake(&mut client, INFO_HASH, [2u8; 20]).await.unwrap_err();
        assert!(matches!(
            err,
            TorrentError::HandshakeError { reason: HandshakeFailure::Truncated, .. }
        ));
    }
}
