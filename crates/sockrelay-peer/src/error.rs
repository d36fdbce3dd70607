/// Errors that can occur in connection, server and client operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sockrelay_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sockrelay_frame::FrameError),

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The peer sent bytes the protocol does not allow at this point.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A bounded wait expired.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The shutdown flag was raised while waiting.
    #[error("interrupted by shutdown")]
    Interrupted,

    /// A worker thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(std::io::Error),
}

impl PeerError {
    /// Whether the error only means the other side went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            PeerError::Disconnected(_) => true,
            PeerError::Frame(sockrelay_frame::FrameError::ConnectionClosed) => true,
            PeerError::Frame(sockrelay_frame::FrameError::Io(err)) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
