//! Stream transports for sockrelay.
//!
//! Provides a unified stream type over the three transport families the
//! server listens on:
//! - Unix domain sockets (filesystem path)
//! - TCP over IPv4
//! - TCP over IPv6
//!
//! This is the lowest layer of sockrelay. Everything else builds on top of
//! the [`RelayStream`] type and the readiness helpers in [`poll`].

pub mod endpoint;
pub mod error;
pub mod poll;
pub mod stream;
pub mod tcp;
pub mod uds;

pub use endpoint::{Endpoint, Family};
pub use error::{Result, TransportError};
pub use poll::{poll_readable, wait_readable};
pub use stream::RelayStream;
pub use tcp::TcpSocket;
pub use uds::UnixDomainSocket;
