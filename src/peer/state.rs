//! Peer state module
//!
//! Defines peer addresses and the per-connection choke/interest flags.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use crate::error::TorrentError;

/// Size of one compact peer record (4-byte IPv4 + 2-byte port)
pub const COMPACT_PEER_SIZE: usize = 6;

/// Address of a remote peer, as handed out by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl PeerAddr {
    /// Create a new peer address
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Decode a single compact record
    pub fn from_compact(record: &[u8]) -> Option<Self> {
        if record.len() != COMPACT_PEER_SIZE {
            return None;
        }
        let ip = Ipv4Addr::new(record[0], record[1], record[2], record[3]);
        let port = u16::from_be_bytes([record[4], record[5]]);
        Some(Self { ip, port })
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl From<PeerAddr> for SocketAddr {
    fn from(addr: PeerAddr) -> Self {
        addr.to_socket_addr()
    }
}

impl From<SocketAddrV4> for PeerAddr {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl FromStr for PeerAddr {
    type Err = TorrentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddrV4>()
            .map(PeerAddr::from)
            .map_err(|e| TorrentError::config_error(format!("Invalid peer address '{}': {}", s, e)))
    }
}

/// Choke and interest flags for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
    /// They're choking us
    pub peer_choking: bool,
    /// We've told them we're interested
    pub am_interested: bool,
}

impl PeerState {
    /// Can we request blocks from this peer?
    pub fn can_request(&self) -> bool {
        !self.peer_choking
    }
}

impl Default for PeerState {
    /// Every connection starts choked and uninterested
    fn default() -> Self {
        Self {
            peer_choking: true,
            am_interested: false,
        }
    }
}
