use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sockrelay_transport::{
    poll_readable, Family, RelayStream, TcpSocket, TransportError, UnixDomainSocket,
};
use tracing::{debug, warn};

use crate::error::Result;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/sockrelay.sock";
pub const DEFAULT_IPV4_PORT: u16 = 3725;
pub const DEFAULT_IPV6_PORT: u16 = 3726;

/// Which endpoints to listen on. `None` leaves a family out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub unix_path: Option<PathBuf>,
    pub ipv4: Option<SocketAddr>,
    pub ipv6: Option<SocketAddr>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            unix_path: Some(PathBuf::from(DEFAULT_SOCKET_PATH)),
            ipv4: Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                DEFAULT_IPV4_PORT,
            ))),
            ipv6: Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::UNSPECIFIED,
                DEFAULT_IPV6_PORT,
                0,
                0,
            ))),
        }
    }
}

enum Bound {
    Unix(UnixDomainSocket),
    Tcp(TcpSocket),
}

impl Bound {
    fn family(&self) -> Family {
        match self {
            Bound::Unix(_) => Family::Unix,
            Bound::Tcp(socket) => socket.family(),
        }
    }

    fn accept(&self) -> sockrelay_transport::Result<RelayStream> {
        match self {
            Bound::Unix(socket) => socket.accept(),
            Bound::Tcp(socket) => socket.accept(),
        }
    }

    fn as_raw_fd(&self) -> RawFd {
        match self {
            Bound::Unix(socket) => socket.as_raw_fd(),
            Bound::Tcp(socket) => socket.as_raw_fd(),
        }
    }
}

/// Listening sockets for every configured family, multiplexed with one poll.
///
/// Dropping it closes the sockets and unlinks the Unix path.
pub struct MultiListener {
    bound: Vec<Bound>,
    fds: Vec<RawFd>,
}

impl MultiListener {
    /// Bind every configured family. Fails if any bind fails or none is
    /// configured.
    pub fn bind(config: &ListenerConfig) -> Result<Self> {
        let mut bound = Vec::with_capacity(3);
        if let Some(path) = &config.unix_path {
            bound.push(Bound::Unix(UnixDomainSocket::bind(path)?));
        }
        if let Some(addr) = config.ipv4 {
            bound.push(Bound::Tcp(TcpSocket::bind(addr)?));
        }
        if let Some(addr) = config.ipv6 {
            bound.push(Bound::Tcp(TcpSocket::bind(addr)?));
        }

        if bound.is_empty() {
            return Err(TransportError::NoEndpoints.into());
        }

        let fds = bound.iter().map(Bound::as_raw_fd).collect();
        Ok(Self { bound, fds })
    }

    /// Wait up to `timeout` and accept at most one connection per ready family.
    ///
    /// An empty result means nothing arrived in time. Failed accepts are
    /// logged and skipped.
    pub fn accept_ready(&self, timeout: Duration) -> Result<Vec<RelayStream>> {
        let ready = poll_readable(&self.fds, timeout)?;

        let mut accepted = Vec::new();
        for (listener, _) in self.bound.iter().zip(ready).filter(|(_, ready)| *ready) {
            match listener.accept() {
                Ok(stream) => accepted.push(stream),
                Err(err) if err.is_spurious_accept() => {
                    debug!(family = %listener.family(), "readiness without a pending connection");
                }
                Err(err) => {
                    warn!(family = %listener.family(), error = %err, "accept failed; skipping");
                }
            }
        }
        Ok(accepted)
    }

    pub fn families(&self) -> Vec<Family> {
        self.bound.iter().map(Bound::family).collect()
    }

    pub fn unix_path(&self) -> Option<&Path> {
        self.bound.iter().find_map(|bound| match bound {
            Bound::Unix(socket) => Some(socket.path()),
            Bound::Tcp(_) => None,
        })
    }

    /// Bound TCP address for `family`, with ephemeral ports resolved.
    pub fn tcp_addr(&self, family: Family) -> Option<SocketAddr> {
        self.bound.iter().find_map(|bound| match bound {
            Bound::Tcp(socket) if socket.family() == family => Some(socket.local_addr()),
            _ => None,
        })
    }
}

impl std::fmt::Debug for MultiListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiListener")
            .field("families", &self.families())
            .field("unix_path", &self.unix_path())
            .finish()
    }
}
