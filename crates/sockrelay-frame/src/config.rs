use std::time::Duration;

/// Default upper bound for a single envelope on the wire: 64 KiB.
///
/// A full frame escapes to at most ~24 KiB of JSON, so this only rejects
/// garbage length headers.
pub const DEFAULT_MAX_ENVELOPE: usize = 64 * 1024;

/// Default retransmissions allowed per frame before the link gives up.
pub const DEFAULT_MAX_RETRANSMITS: u32 = 16;

/// Configuration shared by the transmitter and receiver of a link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Largest envelope (raw or compressed) a length header may announce.
    pub max_envelope_size: usize,
    /// Retransmissions allowed per frame. `None` retries forever.
    pub max_retransmits: Option<u32>,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl LinkConfig {
    /// Whether `failures` consecutive failed checks exhaust the ceiling.
    pub fn retries_exhausted(&self, failures: u32) -> bool {
        self.max_retransmits.is_some_and(|max| failures > max)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_envelope_size: DEFAULT_MAX_ENVELOPE,
            max_retransmits: Some(DEFAULT_MAX_RETRANSMITS),
            read_timeout: None,
            write_timeout: None,
        }
    }
}
