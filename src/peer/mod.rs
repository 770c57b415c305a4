//! Peer management module
//!
//! Handles peer addresses, connections and the per-connection piece session.

pub mod connection;
pub mod session;
pub mod state;

// Re-export main types
pub use connection::PeerConnection;
pub use session::PeerSession;
pub use state::{PeerAddr, PeerState, COMPACT_PEER_SIZE};
