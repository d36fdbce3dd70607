use std::io::{Read, Write};

use tracing::{debug, trace, warn};

use crate::codec::{unpack, Frame, Message};
use crate::compress::gunzip;
use crate::config::LinkConfig;
use crate::envelope;
use crate::error::{FrameError, Result};
use crate::profile::WirePath;
use crate::reader::FrameReader;
use crate::writer::{AckStatus, FrameWriter};

/// Receive side of the acknowledged frame protocol.
#[derive(Debug, Clone)]
pub struct Receiver {
    path: WirePath,
    config: LinkConfig,
}

impl Receiver {
    pub fn new(path: WirePath) -> Self {
        Self::with_config(path, LinkConfig::default())
    }

    pub fn with_config(path: WirePath, config: LinkConfig) -> Self {
        Self { path, config }
    }

    pub fn path(&self) -> WirePath {
        self.path
    }

    /// Receive one message.
    ///
    /// Returns `Ok(None)` when the peer announced a disconnect (count zero) or
    /// closed the stream before sending a count. Frames that fail to
    /// decompress, decode or verify are answered with FAIL and received again.
    pub fn recv_message<R: Read, W: Write>(
        &self,
        reader: &mut FrameReader<R>,
        writer: &mut FrameWriter<W>,
    ) -> Result<Option<Vec<u8>>> {
        let count = match reader.read_count()? {
            None | Some(0) => return Ok(None),
            Some(count) => count,
        };

        // The count is advisory; never pre-allocate from it.
        let mut message = Message::with_capacity(count.min(16) as usize);
        for index in 0..count {
            let frame = self.recv_frame(reader, writer, index)?;
            let last = frame.last;
            message.push(frame);
            if last {
                break;
            }
        }

        if !message.is_terminated() {
            warn!(count, "frame count exhausted without a last frame");
        }

        let payload = unpack(&message);
        debug!(
            frames = message.len(),
            bytes = payload.len(),
            compressed = self.path.is_compressed(),
            "message received"
        );
        Ok(Some(payload))
    }

    fn recv_frame<R: Read, W: Write>(
        &self,
        reader: &mut FrameReader<R>,
        writer: &mut FrameWriter<W>,
        index: u64,
    ) -> Result<Frame> {
        let mut failures = 0u32;
        loop {
            let candidate = self.read_unit(reader)?;

            let rejected = match candidate.and_then(|bytes| envelope::decode(&bytes)) {
                Ok(frame) if frame.verify() => {
                    writer.send_ack(AckStatus::Ok)?;
                    trace!(frame = index, last = frame.last, "frame accepted");
                    return Ok(frame);
                }
                Ok(_) => "checksum mismatch".to_string(),
                Err(err) => err.to_string(),
            };

            writer.send_ack(AckStatus::Fail)?;
            failures += 1;
            if self.config.retries_exhausted(failures) {
                return Err(FrameError::RetryLimitExceeded {
                    frame: index,
                    attempts: failures,
                });
            }
            if failures > 1 {
                warn!(frame = index, failures, reason = %rejected, "frame rejected again");
            } else {
                debug!(frame = index, reason = %rejected, "frame rejected");
            }
        }
    }

    /// Read one unit off the wire.
    ///
    /// The outer result carries stream failures; the inner one carries
    /// integrity failures that only warrant a FAIL acknowledgement.
    fn read_unit<R: Read>(&self, reader: &mut FrameReader<R>) -> Result<Result<Vec<u8>>> {
        let max = self.config.max_envelope_size;
        match self.path {
            WirePath::Raw => {
                let len = reader.read_len(max)?;
                Ok(Ok(reader.read_bytes(len)?))
            }
            WirePath::Compressed => {
                let gz_len = reader.read_len(max)?;
                let original_len = reader.read_len(max)?;
                let gzipped = reader.read_bytes(gz_len)?;
                Ok(gunzip(&gzipped, original_len))
            }
        }
    }
}
