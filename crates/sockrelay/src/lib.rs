//! Checksummed, acknowledged message relay over Unix and TCP sockets.
//!
//! A server listens on a Unix domain socket, an IPv4 port and an IPv6 port
//! at once. Clients connect with one of three profiles and exchange
//! request/reply messages that travel as CRC-checked JSON frames, each
//! acknowledged and retransmitted until it arrives intact.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix/TCP streams, listeners and readiness polling
//! - [`frame`]: frame codec, envelope, compression, transmitter and receiver
//! - [`peer`]: connections, registry, server and client sessions
//! - [`backend`]: the log-query and system-info command backends
//! - [`input`]: line source for interactive clients

pub mod backend;
pub mod input;

/// Re-export transport types.
pub mod transport {
    pub use sockrelay_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sockrelay_frame::*;
}

/// Re-export peer types.
pub mod peer {
    pub use sockrelay_peer::*;
}
