use std::time::Duration;

use sockrelay_frame::{
    send_goodbye, ClientProfile, Direction, FrameError, FrameReader, FrameWriter, LinkConfig,
    Receiver, SendStats, Transmitter, WirePath, REPLY_MARKER,
};
use sockrelay_transport::{Endpoint, Family, RelayStream};
use tracing::debug;

use crate::error::{PeerError, Result};
use crate::handshake::{handshake_client, handshake_server, Handshake, HandshakeConfig};
use crate::shutdown::ShutdownFlag;

/// Which end of the link this connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Server,
    Client,
}

impl Side {
    fn outbound(self) -> Direction {
        match self {
            Side::Server => Direction::ServerToClient,
            Side::Client => Direction::ClientToServer,
        }
    }

    fn inbound(self) -> Direction {
        match self {
            Side::Server => Direction::ClientToServer,
            Side::Client => Direction::ServerToClient,
        }
    }
}

/// A handshaken stream with the transmitter and receiver its profile selects.
pub struct Connection {
    reader: FrameReader<RelayStream>,
    writer: FrameWriter<RelayStream>,
    handshake: Handshake,
    side: Side,
    transmitter: Transmitter,
    receiver: Receiver,
    peer: String,
}

impl Connection {
    /// Server side: read the profile from a freshly accepted stream.
    ///
    /// Gives up with [`PeerError::Interrupted`] once `shutdown` goes DOWN.
    pub fn accept(
        stream: RelayStream,
        handshake_config: &HandshakeConfig,
        link: &LinkConfig,
        shutdown: &ShutdownFlag,
    ) -> Result<Self> {
        stream.set_read_timeout(Some(handshake_config.timeout))?;
        let mut reader = FrameReader::new(stream.try_clone()?);
        let handshake = handshake_server(&mut reader, handshake_config, shutdown)?;
        Self::from_parts(reader, stream, handshake, Side::Server, link)
    }

    /// Client side: connect and announce `profile`.
    pub fn connect(endpoint: &Endpoint, profile: ClientProfile, link: &LinkConfig) -> Result<Self> {
        let stream = endpoint.connect()?;
        let reader = FrameReader::new(stream.try_clone()?);
        let mut writer = FrameWriter::new(stream);
        handshake_client(&mut writer, profile)?;

        let handshake = Handshake {
            raw: profile.to_wire(),
            profile: Some(profile),
        };
        let stream = writer.into_inner();
        Self::from_parts(reader, stream, handshake, Side::Client, link)
    }

    fn from_parts(
        reader: FrameReader<RelayStream>,
        stream: RelayStream,
        handshake: Handshake,
        side: Side,
        link: &LinkConfig,
    ) -> Result<Self> {
        // Read and write halves share one socket, so this also resets the
        // handshake timeout on the reader.
        stream.set_read_timeout(link.read_timeout)?;
        stream.set_write_timeout(link.write_timeout)?;

        let peer = stream.peer_label();
        let transmitter = Transmitter::with_config(
            WirePath::select(handshake.profile, side.outbound()),
            link.clone(),
        );
        let receiver = Receiver::with_config(
            WirePath::select(handshake.profile, side.inbound()),
            link.clone(),
        );

        Ok(Self {
            reader,
            writer: FrameWriter::new(stream),
            handshake,
            side,
            transmitter,
            receiver,
            peer,
        })
    }

    pub fn profile(&self) -> Option<ClientProfile> {
        self.handshake.profile
    }

    pub fn handshake(&self) -> Handshake {
        self.handshake
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn family(&self) -> Family {
        self.reader.get_ref().family()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Wait up to `timeout` for inbound bytes or a closed peer.
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool> {
        Ok(self.reader.get_ref().poll_readable(timeout)?)
    }

    pub fn send_message(&mut self, payload: &[u8]) -> Result<SendStats> {
        Ok(self
            .transmitter
            .send_message(&mut self.reader, &mut self.writer, payload)?)
    }

    /// Receive one message; `None` means the peer left.
    pub fn recv_message(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .receiver
            .recv_message(&mut self.reader, &mut self.writer)?)
    }

    pub fn send_reply_marker(&mut self) -> Result<()> {
        self.writer.send_marker()?;
        Ok(())
    }

    /// Read the marker that precedes a reply.
    ///
    /// Returns `false` if the server closed the stream instead.
    pub fn read_reply_marker(&mut self) -> Result<bool> {
        match self.reader.read_u8() {
            Ok(REPLY_MARKER) => Ok(true),
            Ok(other) => Err(PeerError::Protocol(format!(
                "expected reply marker, got {other:#04x}"
            ))),
            Err(FrameError::ConnectionClosed) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Tell the peer this side is leaving (frame count zero).
    pub fn send_goodbye(&mut self) -> Result<()> {
        send_goodbye(&mut self.writer)?;
        debug!(peer = %self.peer, "goodbye sent");
        Ok(())
    }

    /// Shut down both halves of the socket.
    pub fn close(&self) {
        // The peer may already be gone; nothing useful to do with the error.
        let _ = self.reader.get_ref().shutdown();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("side", &self.side)
            .field("profile", &self.handshake.profile)
            .field("family", &self.family())
            .field("peer", &self.peer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::testutil::{cleanup, connected};

    #[test]
    fn profile_b_compresses_only_server_replies() {
        let (mut server, mut client, path) = connected("conn-b", ClientProfile::B);
        assert_eq!(server.profile(), Some(ClientProfile::B));
        assert_eq!(server.side(), Side::Server);
        assert_eq!(client.family(), Family::Unix);

        let server = thread::spawn(move || {
            let request = server
                .recv_message()
                .expect("request should arrive")
                .expect("request should not be a goodbye");
            assert_eq!(request, b"-n 5");

            server.send_reply_marker().expect("marker should send");
            let stats = server
                .send_message(&vec![b'x'; 9000])
                .expect("reply should send");
            assert!(stats.wire_bytes < 9000);

            assert_eq!(server.recv_message().expect("goodbye should arrive"), None);
        });

        let stats = client.send_message(b"-n 5").expect("request should send");
        assert!(stats.wire_bytes > 4);
        assert!(client.read_reply_marker().expect("marker should arrive"));
        let reply = client
            .recv_message()
            .expect("reply should arrive")
            .expect("reply should not be a goodbye");
        assert_eq!(reply, vec![b'x'; 9000]);

        client.send_goodbye().expect("goodbye should send");
        server.join().expect("server thread should finish");
        cleanup(&path);
    }

    #[test]
    fn closed_server_reads_as_missing_marker() {
        let (server, mut client, path) = connected("conn-close", ClientProfile::A);
        server.close();

        assert!(client
            .poll_readable(Duration::from_millis(500))
            .expect("poll should succeed"));
        assert!(!client.read_reply_marker().expect("eof is not an error"));
        cleanup(&path);
    }

    #[test]
    fn idle_connection_is_not_readable() {
        let (server, _client, path) = connected("conn-idle", ClientProfile::C);
        assert!(!server
            .poll_readable(Duration::from_millis(10))
            .expect("poll should succeed"));
        cleanup(&path);
    }
}
