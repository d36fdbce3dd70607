use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::endpoint::Family;
use crate::error::Result;
use crate::poll::wait_readable;

/// A connected stream on any supported family. Implements Read + Write.
///
/// This is the fundamental I/O type returned by accept and connect.
pub struct RelayStream {
    inner: RelayStreamInner,
    family: Family,
}

enum RelayStreamInner {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Read for RelayStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RelayStreamInner::Unix(stream) => stream.read(buf),
            RelayStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for RelayStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RelayStreamInner::Unix(stream) => stream.write(buf),
            RelayStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            RelayStreamInner::Unix(stream) => stream.flush(),
            RelayStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl RelayStream {
    pub(crate) fn from_unix(stream: UnixStream) -> Self {
        Self {
            inner: RelayStreamInner::Unix(stream),
            family: Family::Unix,
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream, family: Family) -> Self {
        Self {
            inner: RelayStreamInner::Tcp(stream),
            family,
        }
    }

    /// Transport family this stream was opened on.
    pub fn family(&self) -> Family {
        self.family
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RelayStreamInner::Unix(stream) => stream.set_read_timeout(timeout)?,
            RelayStreamInner::Tcp(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RelayStreamInner::Unix(stream) => stream.set_write_timeout(timeout)?,
            RelayStreamInner::Tcp(stream) => stream.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            RelayStreamInner::Unix(stream) => RelayStreamInner::Unix(stream.try_clone()?),
            RelayStreamInner::Tcp(stream) => RelayStreamInner::Tcp(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            family: self.family,
        })
    }

    /// Wait up to `timeout` for the stream to become readable.
    ///
    /// A peer that closed its end also counts as readable; the following
    /// read observes the zero-length result.
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool> {
        wait_readable(self.as_raw_fd(), timeout)
    }

    /// Shut down both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            RelayStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both)?,
            RelayStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both)?,
        }
        Ok(())
    }

    /// Human-readable peer description for logs.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            RelayStreamInner::Unix(_) => "unix-peer".to_string(),
            RelayStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp-peer".to_string()),
        }
    }
}

impl AsRawFd for RelayStream {
    fn as_raw_fd(&self) -> RawFd {
        match &self.inner {
            RelayStreamInner::Unix(stream) => stream.as_raw_fd(),
            RelayStreamInner::Tcp(stream) => stream.as_raw_fd(),
        }
    }
}

impl std::fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStream")
            .field("family", &self.family.as_str())
            .field("fd", &self.as_raw_fd())
            .finish()
    }
}
