//! Connections, server and client for sockrelay.
//!
//! The server binds one listener per transport family, multiplexes accepts
//! with a bounded poll and runs every connection on its own thread. A
//! shared [`ShutdownFlag`] stops all loops at their next poll boundary,
//! after which the [`ConnectionRegistry`] is drained before the listeners
//! are released.

pub mod backend;
pub mod client;
pub mod connection;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod listener;
pub mod registry;
pub mod server;
pub mod shutdown;

#[cfg(test)]
mod testutil;

pub use backend::{CommandBackend, Dispatcher, INVALID_COMMAND};
pub use client::{Client, ClientConfig, ClientSession, LineSource, SessionEnd, Turn};
pub use connection::{Connection, Side};
pub use error::{PeerError, Result};
pub use handler::{ConnectionHandler, HandlerExit};
pub use handshake::{handshake_client, handshake_server, Handshake, HandshakeConfig};
pub use listener::{
    ListenerConfig, MultiListener, DEFAULT_IPV4_PORT, DEFAULT_IPV6_PORT, DEFAULT_SOCKET_PATH,
};
pub use registry::{ConnectionId, ConnectionIds, ConnectionRegistry, Registration};
pub use server::{Server, ServerConfig, ServerSummary, DEFAULT_POLL_INTERVAL};
pub use shutdown::ShutdownFlag;
