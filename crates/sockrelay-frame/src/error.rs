/// Errors that can occur while framing, sending or receiving messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed in the middle of a message.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,

    /// The envelope could not be serialized or parsed as JSON.
    #[error("envelope json error: {0}")]
    Envelope(#[from] serde_json::Error),

    /// The envelope parsed but its contents are not a valid frame.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// A length header announced more bytes than the link accepts.
    #[error("envelope too large ({size} bytes, max {max})")]
    EnvelopeTooLarge { size: u64, max: usize },

    /// A frame payload exceeds the frame capacity.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Gzip encoding or decoding failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The acknowledgement byte was neither OK nor FAIL.
    #[error("invalid acknowledgement byte {0:#04x}")]
    InvalidAck(u8),

    /// A frame kept failing its checksum past the configured ceiling.
    #[error("frame {frame} failed verification {attempts} times; giving up")]
    RetryLimitExceeded { frame: u64, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
