//! Loopback seeder used by the peer and download tests

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::TorrentResult;
use crate::peer::PeerAddr;
use crate::protocol::{read_frame, write_frame, Frame, Handshake, Message, MessageId, HANDSHAKE_LENGTH};
use crate::torrent::TorrentInfo;

pub const SEEDER_PEER_ID: [u8; 20] = *b"-SEED01-abcdefghijkl";

/// Gap between the filler frames a stalling seeder sends
const CHATTER_INTERVAL: Duration = Duration::from_millis(50);

/// Build validated metadata describing `data`
pub fn torrent_for(data: &[u8], piece_length: u32) -> TorrentInfo {
    let hashes: Vec<u8> = data
        .chunks(piece_length as usize)
        .flat_map(|chunk| Sha1::digest(chunk).to_vec())
        .collect();
    TorrentInfo::new(
        "http://127.0.0.1:1/announce".to_string(),
        "fixture.bin".to_string(),
        data.len() as u64,
        piece_length,
        &hashes,
        [0x42; 20],
    )
    .unwrap()
}

/// How the seeder serves one connection
#[derive(Debug, Clone)]
pub struct Seed {
    pub info_hash: [u8; 20],
    pub data: Arc<Vec<u8>>,
    pub piece_length: u32,
    /// Pieces whose first block is served with a flipped byte
    pub corrupt_pieces: Vec<u32>,
    /// Drop the connection instead of answering the request after this many blocks
    pub disconnect_after: Option<usize>,
    /// Interleave keep-alives and mismatched piece messages with real traffic
    pub noisy: bool,
    /// Answer interest with an endless stream of `have` instead of unchoking
    pub never_unchoke: bool,
    /// Unchoke but answer requests with nothing but keep-alives
    pub ignore_requests: bool,
}

impl Seed {
    pub fn new(torrent: &TorrentInfo, data: &[u8]) -> Self {
        Self {
            info_hash: torrent.info_hash,
            data: Arc::new(data.to_vec()),
            piece_length: torrent.piece_length,
            corrupt_pieces: Vec::new(),
            disconnect_after: None,
            noisy: false,
            never_unchoke: false,
            ignore_requests: false,
        }
    }
}

/// Serve a single client over `stream` until it hangs up
pub async fn serve_peer<S>(mut stream: S, seed: Seed) -> TorrentResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = [0u8; HANDSHAKE_LENGTH];
    stream.read_exact(&mut request).await?;
    Handshake::deserialize(&request)?;
    stream
        .write_all(&Handshake::new(seed.info_hash, SEEDER_PEER_ID).serialize())
        .await?;

    let mut served = 0usize;
    loop {
        let message = match read_frame(&mut stream).await {
            Ok(Frame::Message(message)) => message,
            Ok(Frame::KeepAlive) => continue,
            Err(_) => return Ok(()),
        };

        match message.kind() {
            Some(MessageId::Interested) if seed.never_unchoke => loop {
                tokio::time::sleep(CHATTER_INTERVAL).await;
                write_frame(&mut stream, &Message::have(0).into()).await?;
            },
            Some(MessageId::Request) if seed.ignore_requests => loop {
                tokio::time::sleep(CHATTER_INTERVAL).await;
                write_frame(&mut stream, &Frame::KeepAlive).await?;
            },
            Some(MessageId::Interested) => {
                if seed.noisy {
                    write_frame(&mut stream, &Frame::KeepAlive).await?;
                    write_frame(&mut stream, &Message::have(0).into()).await?;
                }
                write_frame(&mut stream, &Message::unchoke().into()).await?;
            }
            Some(MessageId::Request) => {
                if seed.disconnect_after.is_some_and(|limit| served >= limit) {
                    return Ok(());
                }
                let (index, begin, length) = message.as_request()?;
                let start = index as usize * seed.piece_length as usize + begin as usize;
                let mut block = seed.data[start..start + length as usize].to_vec();
                if begin == 0 && seed.corrupt_pieces.contains(&index) {
                    block[0] ^= 0xff;
                }

                if seed.noisy {
                    write_frame(&mut stream, &Message::piece(index + 1, begin, &block).into()).await?;
                    write_frame(&mut stream, &Frame::KeepAlive).await?;
                    write_frame(&mut stream, &Message::piece(index, begin + length, &block).into()).await?;
                }
                write_frame(&mut stream, &Message::piece(index, begin, &block).into()).await?;
                served += 1;
            }
            _ => {}
        }
    }
}

/// Accept connections on a loopback port and seed each one
pub async fn spawn_seeder(seed: Seed) -> PeerAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_peer(socket, seed.clone()));
        }
    });
    PeerAddr::new(Ipv4Addr::LOCALHOST, port)
}

/// An address nobody listens on
pub async fn dead_peer() -> PeerAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    PeerAddr::new(Ipv4Addr::LOCALHOST, port)
}
