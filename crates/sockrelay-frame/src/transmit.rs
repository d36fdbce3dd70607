use std::io::{Read, Write};

use tracing::{debug, trace, warn};

use crate::codec::pack;
use crate::compress::gzip;
use crate::config::LinkConfig;
use crate::envelope;
use crate::error::{FrameError, Result};
use crate::profile::WirePath;
use crate::reader::FrameReader;
use crate::writer::{AckStatus, FrameWriter};

/// Counters for one transmitted message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub frames: u64,
    pub retransmits: u64,
    pub payload_bytes: usize,
    /// Frame-unit bytes written, retransmissions included.
    pub wire_bytes: usize,
}

/// Send side of the acknowledged frame protocol.
#[derive(Debug, Clone)]
pub struct Transmitter {
    path: WirePath,
    config: LinkConfig,
}

impl Transmitter {
    pub fn new(path: WirePath) -> Self {
        Self::with_config(path, LinkConfig::default())
    }

    pub fn with_config(path: WirePath, config: LinkConfig) -> Self {
        Self { path, config }
    }

    pub fn path(&self) -> WirePath {
        self.path
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Send `payload` as one message and wait for every frame to be acknowledged.
    ///
    /// A FAIL acknowledgement resends the identical unit, headers included.
    pub fn send_message<R: Read, W: Write>(
        &self,
        reader: &mut FrameReader<R>,
        writer: &mut FrameWriter<W>,
        payload: &[u8],
    ) -> Result<SendStats> {
        let message = pack(payload, payload.len());
        let mut stats = SendStats {
            payload_bytes: payload.len(),
            ..SendStats::default()
        };

        writer.send_count(message.len() as u64)?;

        for (index, frame) in message.iter().enumerate() {
            let index = index as u64;
            let unit = self.prepare(&envelope::encode(frame)?)?;

            let mut failures = 0u32;
            loop {
                stats.wire_bytes += unit.send(writer)?;

                match reader.read_ack()? {
                    AckStatus::Ok => {
                        trace!(frame = index, "frame acknowledged");
                        break;
                    }
                    AckStatus::Fail => {
                        failures += 1;
                        stats.retransmits += 1;
                        if self.config.retries_exhausted(failures) {
                            return Err(FrameError::RetryLimitExceeded {
                                frame: index,
                                attempts: failures,
                            });
                        }
                        if failures > 1 {
                            warn!(frame = index, failures, "frame rejected again, retransmitting");
                        } else {
                            debug!(frame = index, "frame rejected, retransmitting");
                        }
                    }
                }
            }
            stats.frames += 1;
        }

        debug!(
            frames = stats.frames,
            retransmits = stats.retransmits,
            payload_bytes = stats.payload_bytes,
            wire_bytes = stats.wire_bytes,
            compressed = self.path.is_compressed(),
            "message sent"
        );
        Ok(stats)
    }

    fn prepare(&self, encoded: &[u8]) -> Result<Unit> {
        match self.path {
            WirePath::Raw => Ok(Unit::Raw(encoded.to_vec())),
            WirePath::Compressed => Ok(Unit::Compressed {
                gzipped: gzip(encoded)?,
                original_len: encoded.len(),
            }),
        }
    }
}

/// Announce a graceful disconnect: a frame count of zero.
pub fn send_goodbye<W: Write>(writer: &mut FrameWriter<W>) -> Result<()> {
    writer.send_count(0)
}

/// The on-wire bytes of one frame, built once and reused across retries.
enum Unit {
    Raw(Vec<u8>),
    Compressed { gzipped: Vec<u8>, original_len: usize },
}

impl Unit {
    fn send<W: Write>(&self, writer: &mut FrameWriter<W>) -> Result<usize> {
        match self {
            Unit::Raw(envelope) => writer.send_raw_envelope(envelope),
            Unit::Compressed {
                gzipped,
                original_len,
            } => writer.send_compressed_envelope(gzipped, *original_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::os::unix::net::UnixStream;
    use std::thread;

    use super::*;
    use crate::codec::FRAME_CAPACITY;
    use crate::receive::Receiver;

    fn acks(statuses: &[AckStatus]) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(
            statuses.iter().map(|status| status.as_byte()).collect(),
        ))
    }

    /// Flips one bit in the first frame unit it carries.
    struct CorruptOnce {
        inner: UnixStream,
        corrupted: bool,
    }

    impl Write for CorruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            // Skip the 8-byte count header; units are always longer.
            if !self.corrupted && buf.len() > 8 {
                self.corrupted = true;
                let mut copy = buf.to_vec();
                // First payload character of `{"message":"...`.
                copy[8 + 12] ^= 0x01;
                return self.inner.write(&copy);
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn fail_ack_resends_identical_unit() {
        let tx = Transmitter::new(WirePath::Raw);
        let mut reader = acks(&[AckStatus::Fail, AckStatus::Ok]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let stats = tx.send_message(&mut reader, &mut writer, b"hello").unwrap();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.retransmits, 1);

        let wire = writer.into_inner().into_inner();
        assert_eq!(&wire[..8], &1u64.to_ne_bytes());
        let units = &wire[8..];
        assert_eq!(units.len() % 2, 0);
        let (first, second) = units.split_at(units.len() / 2);
        assert_eq!(first, second);
        assert_eq!(stats.wire_bytes, units.len());
    }

    #[test]
    fn retry_ceiling_gives_up() {
        let config = LinkConfig {
            max_retransmits: Some(2),
            ..LinkConfig::default()
        };
        let tx = Transmitter::with_config(WirePath::Raw, config);
        let mut reader = acks(&[AckStatus::Fail; 3]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let err = tx.send_message(&mut reader, &mut writer, b"x").unwrap_err();
        assert!(matches!(
            err,
            FrameError::RetryLimitExceeded {
                frame: 0,
                attempts: 3
            }
        ));
    }

    #[test]
    fn compressed_path_writes_both_length_headers() {
        let tx = Transmitter::new(WirePath::Compressed);
        let mut reader = acks(&[AckStatus::Ok]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        tx.send_message(&mut reader, &mut writer, b"hello").unwrap();

        let wire = writer.into_inner().into_inner();
        let gz_len = u64::from_ne_bytes(wire[8..16].try_into().unwrap()) as usize;
        let original_len = u64::from_ne_bytes(wire[16..24].try_into().unwrap()) as usize;
        assert_eq!(wire.len(), 24 + gz_len);
        assert_eq!(&wire[24..26], &[0x1f, 0x8b]);

        let inflated = crate::compress::gunzip(&wire[24..], original_len).unwrap();
        let frame = envelope::decode(&inflated).unwrap();
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn invalid_ack_is_an_error() {
        let tx = Transmitter::new(WirePath::Raw);
        let mut reader = FrameReader::new(Cursor::new(vec![5u8]));
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        assert!(matches!(
            tx.send_message(&mut reader, &mut writer, b"x"),
            Err(FrameError::InvalidAck(5))
        ));
    }

    #[test]
    fn corrupted_frame_is_retransmitted_until_clean() {
        let (client, server) = UnixStream::pair().unwrap();

        let sender = thread::spawn(move || {
            let mut reader = FrameReader::new(client.try_clone().unwrap());
            let mut writer = FrameWriter::new(CorruptOnce {
                inner: client,
                corrupted: false,
            });
            Transmitter::new(WirePath::Raw)
                .send_message(&mut reader, &mut writer, b"hello")
                .unwrap()
        });

        let mut reader = FrameReader::new(server.try_clone().unwrap());
        let mut writer = FrameWriter::new(server);
        let received = Receiver::new(WirePath::Raw)
            .recv_message(&mut reader, &mut writer)
            .unwrap();

        assert_eq!(received.as_deref(), Some(b"hello".as_ref()));
        let stats = sender.join().unwrap();
        assert_eq!(stats.retransmits, 1);
    }

    #[test]
    fn multi_frame_message_counts_every_frame() {
        let payload = vec![b'z'; 2 * FRAME_CAPACITY + 1];
        let tx = Transmitter::new(WirePath::Raw);
        let mut reader = acks(&[AckStatus::Ok; 3]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let stats = tx.send_message(&mut reader, &mut writer, &payload).unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.retransmits, 0);
        assert_eq!(stats.payload_bytes, payload.len());
    }
}
