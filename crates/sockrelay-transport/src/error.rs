use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the listening endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// No listening endpoint was configured.
    #[error("no listening endpoint configured")]
    NoEndpoints,
}

impl TransportError {
    /// Whether this is an accept that found nothing to accept after all.
    ///
    /// Listeners are non-blocking, so a connection reset between readiness
    /// and `accept` surfaces as `WouldBlock`.
    pub fn is_spurious_accept(&self) -> bool {
        matches!(
            self,
            TransportError::Accept(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::ConnectionAborted
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
