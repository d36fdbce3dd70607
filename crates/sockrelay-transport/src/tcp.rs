use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

use tracing::{debug, info};

use crate::endpoint::Family;
use crate::error::{Result, TransportError};
use crate::stream::RelayStream;

/// TCP listener for one IP family.
pub struct TcpSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
    family: Family,
}

impl TcpSocket {
    /// Bind and listen on `addr`.
    ///
    /// Port `0` asks the OS for an ephemeral port; [`local_addr`](Self::local_addr)
    /// reports the one actually bound.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let bind_err = |source: std::io::Error| TransportError::Bind {
            endpoint: addr.to_string(),
            source,
        };

        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        let family = Family::of(&local_addr);

        info!(%local_addr, %family, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
            family,
        })
    }

    /// Accept a pending connection.
    ///
    /// The listener is non-blocking; call this after readiness was reported.
    /// The returned stream is blocking with Nagle disabled, since the
    /// protocol exchanges small headers in lock-step.
    pub fn accept(&self) -> Result<RelayStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;
        stream.set_nodelay(true).map_err(TransportError::Accept)?;
        debug!(%peer, family = %self.family, "accepted tcp connection");
        Ok(RelayStream::from_tcp(stream, self.family))
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(addr: SocketAddr) -> Result<RelayStream> {
        let connect_err = |source: std::io::Error| TransportError::Connect {
            endpoint: addr.to_string(),
            source,
        };
        let stream = TcpStream::connect(addr).map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        debug!(%addr, "connected to tcp socket");
        Ok(RelayStream::from_tcp(stream, Family::of(&addr)))
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn family(&self) -> Family {
        self.family
    }
}

impl AsRawFd for TcpSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

impl std::fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSocket")
            .field("local_addr", &self.local_addr)
            .field("family", &self.family)
            .finish()
    }
}
