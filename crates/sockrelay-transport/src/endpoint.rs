use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::Result;
use crate::stream::RelayStream;
use crate::tcp::TcpSocket;
use crate::uds::UnixDomainSocket;

/// Transport family of a listener or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Unix,
    Ipv4,
    Ipv6,
}

impl Family {
    /// Short lowercase name used in logs and output.
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Unix => "unix",
            Family::Ipv4 => "ipv4",
            Family::Ipv6 => "ipv6",
        }
    }

    pub(crate) fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => Family::Ipv4,
            SocketAddr::V6(_) => Family::Ipv6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address a client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
    /// TCP address; the family follows the address kind.
    Tcp(SocketAddr),
}

impl Endpoint {
    pub fn family(&self) -> Family {
        match self {
            Endpoint::Unix(_) => Family::Unix,
            Endpoint::Tcp(addr) => Family::of(addr),
        }
    }

    /// Open a blocking stream to this endpoint.
    pub fn connect(&self) -> Result<RelayStream> {
        match self {
            Endpoint::Unix(path) => UnixDomainSocket::connect(path),
            Endpoint::Tcp(addr) => TcpSocket::connect(*addr),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_follows_address_kind() {
        let v4: SocketAddr = "127.0.0.1:3725".parse().unwrap();
        let v6: SocketAddr = "[::1]:3726".parse().unwrap();

        assert_eq!(Endpoint::Tcp(v4).family(), Family::Ipv4);
        assert_eq!(Endpoint::Tcp(v6).family(), Family::Ipv6);
        assert_eq!(
            Endpoint::Unix(PathBuf::from("/tmp/x.sock")).family(),
            Family::Unix
        );
    }

    #[test]
    fn display_is_scheme_prefixed() {
        let v4: SocketAddr = "127.0.0.1:3725".parse().unwrap();
        assert_eq!(Endpoint::Tcp(v4).to_string(), "tcp:127.0.0.1:3725");
        assert_eq!(
            Endpoint::Unix(PathBuf::from("/tmp/x.sock")).to_string(),
            "unix:/tmp/x.sock"
        );
    }
}
