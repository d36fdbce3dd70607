use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use sockrelay_frame::{ClientProfile, FrameError, FrameReader, FrameWriter};
use sockrelay_transport::wait_readable;

use crate::error::{PeerError, Result};
use crate::server::DEFAULT_POLL_INTERVAL;
use crate::shutdown::ShutdownFlag;

/// Configuration for the profile handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long the server waits for a freshly connected client to send its
    /// profile.
    pub timeout: Duration,
    /// Slice of the wait between shutdown-flag checks. [`Server`] replaces
    /// it with its own poll interval.
    ///
    /// [`Server`]: crate::server::Server
    pub poll_interval: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What the server learned from the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    /// The value exactly as sent.
    pub raw: u32,
    /// `None` when `raw` names no known profile. Such connections are kept
    /// and every request on them is answered with `invalid command`.
    pub profile: Option<ClientProfile>,
}

/// Client side: announce the profile right after connecting.
pub fn handshake_client<W: Write>(writer: &mut FrameWriter<W>, profile: ClientProfile) -> Result<()> {
    writer.send_u32(profile.to_wire())?;
    Ok(())
}

/// Server side: wait for the client's profile and read it.
///
/// The wait is cut into `config.poll_interval` slices so a DOWN flag ends it
/// within one slice ([`PeerError::Interrupted`]). A client that stays silent
/// for `config.timeout` gets [`PeerError::Timeout`]. Once bytes arrive the
/// read itself is bounded by the stream's read timeout.
pub fn handshake_server<R: Read + AsRawFd>(
    reader: &mut FrameReader<R>,
    config: &HandshakeConfig,
    shutdown: &ShutdownFlag,
) -> Result<Handshake> {
    let deadline = Instant::now() + config.timeout;
    loop {
        if shutdown.is_down() {
            return Err(PeerError::Interrupted);
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(PeerError::Timeout(config.timeout));
        }
        if wait_readable(reader.get_ref().as_raw_fd(), config.poll_interval.min(left))? {
            break;
        }
    }

    let raw = reader.read_u32().map_err(|err| match err {
        FrameError::ConnectionClosed => {
            PeerError::HandshakeFailed("peer closed before sending its profile".to_string())
        }
        FrameError::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            PeerError::Timeout(config.timeout)
        }
        other => PeerError::Frame(other),
    })?;

    Ok(Handshake {
        raw,
        profile: ClientProfile::from_wire(raw),
    })
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;

    use super::*;

    fn quick() -> HandshakeConfig {
        HandshakeConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn client_profile_reaches_server() {
        for profile in ClientProfile::ALL {
            let (client, server) = UnixStream::pair().expect("pair should open");
            let mut writer = FrameWriter::new(client);
            handshake_client(&mut writer, profile).expect("handshake send should succeed");

            let mut reader = FrameReader::new(server);
            let handshake = handshake_server(&mut reader, &quick(), &ShutdownFlag::new())
                .expect("handshake read should succeed");

            assert_eq!(handshake.profile, Some(profile));
            assert_eq!(handshake.raw, profile.to_wire());
        }
    }

    #[test]
    fn unknown_profile_is_kept_as_none() {
        let (mut client, server) = UnixStream::pair().expect("pair should open");
        client.write_all(&7u32.to_ne_bytes()).expect("write");

        let mut reader = FrameReader::new(server);
        let handshake = handshake_server(&mut reader, &quick(), &ShutdownFlag::new())
            .expect("handshake read should succeed");

        assert_eq!(handshake.raw, 7);
        assert_eq!(handshake.profile, None);
    }

    #[test]
    fn closed_before_profile_fails() {
        let (mut client, server) = UnixStream::pair().expect("pair should open");
        client.write_all(&[0u8, 0]).expect("write");
        drop(client);

        let mut reader = FrameReader::new(server);
        let err = handshake_server(&mut reader, &quick(), &ShutdownFlag::new()).unwrap_err();
        assert!(matches!(err, PeerError::HandshakeFailed(_)));
    }

    #[test]
    fn silent_client_times_out() {
        let (_client, server) = UnixStream::pair().expect("pair should open");
        let config = HandshakeConfig {
            timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(10),
        };

        let mut reader = FrameReader::new(server);
        let err = handshake_server(&mut reader, &config, &ShutdownFlag::new()).unwrap_err();
        assert!(matches!(err, PeerError::Timeout(t) if t == config.timeout));
    }

    #[test]
    fn shutdown_ends_the_wait_for_a_silent_client() {
        let (_client, server) = UnixStream::pair().expect("pair should open");
        let shutdown = ShutdownFlag::new();
        let trigger = shutdown.clone();
        let flipper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            trigger.trigger();
        });

        let started = Instant::now();
        let mut reader = FrameReader::new(server);
        let err = handshake_server(&mut reader, &quick(), &shutdown).unwrap_err();

        assert!(matches!(err, PeerError::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(1));
        flipper.join().expect("flag thread should finish");
    }
}
