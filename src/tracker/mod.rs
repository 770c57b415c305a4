//! Tracker module
//!
//! Peer discovery through a single HTTP(S) announce.

pub mod http;

pub use http::{build_announce_url, parse_announce_response, parse_compact_peers, Announce, AnnounceRequest, TrackerClient};
