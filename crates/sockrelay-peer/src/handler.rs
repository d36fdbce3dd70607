use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::Dispatcher;
use crate::connection::Connection;
use crate::error::Result;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::shutdown::ShutdownFlag;

/// Why a handler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerExit {
    /// The client sent a zero count or closed its socket.
    PeerClosed,
    /// The shutdown flag went DOWN.
    Shutdown,
    /// A transport or protocol error ended this connection.
    Failed,
}

/// Request/response loop for one accepted connection.
#[derive(Debug)]
pub struct ConnectionHandler {
    id: ConnectionId,
    connection: Connection,
    dispatcher: Dispatcher,
    shutdown: ShutdownFlag,
    poll_interval: Duration,
}

impl ConnectionHandler {
    pub fn new(
        id: ConnectionId,
        connection: Connection,
        dispatcher: Dispatcher,
        shutdown: ShutdownFlag,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            connection,
            dispatcher,
            shutdown,
            poll_interval,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Serve until the peer leaves, the flag goes DOWN, or the link fails.
    ///
    /// The handler is registered for exactly the duration of this call.
    /// Errors end this connection only; the listener and other handlers
    /// keep running.
    pub fn run(mut self, registry: &ConnectionRegistry) -> HandlerExit {
        let _registration = registry.register(self.id);
        info!(
            connection = %self.id,
            family = %self.connection.family(),
            peer = %self.connection.peer(),
            profile = ?self.connection.profile(),
            "connection ready"
        );

        let exit = match self.serve() {
            Ok(exit) => exit,
            Err(err) if err.is_disconnect() => {
                info!(connection = %self.id, error = %err, "peer dropped mid-message");
                HandlerExit::PeerClosed
            }
            Err(err) => {
                warn!(connection = %self.id, error = %err, "connection failed; closing it");
                HandlerExit::Failed
            }
        };

        self.connection.close();
        info!(connection = %self.id, exit = ?exit, "connection closed");
        exit
    }

    fn serve(&mut self) -> Result<HandlerExit> {
        loop {
            let readable = self.connection.poll_readable(self.poll_interval)?;
            if self.shutdown.is_down() {
                return Ok(HandlerExit::Shutdown);
            }
            if !readable {
                continue;
            }

            let Some(request) = self.connection.recv_message()? else {
                info!(connection = %self.id, "peer disconnected");
                return Ok(HandlerExit::PeerClosed);
            };

            let command = String::from_utf8_lossy(&request);
            debug!(connection = %self.id, command = %command, "request received");
            let reply = self.dispatcher.dispatch(self.connection.profile(), &command);

            self.connection.send_reply_marker()?;
            let stats = self.connection.send_message(reply.as_bytes())?;
            debug!(
                connection = %self.id,
                frames = stats.frames,
                retransmits = stats.retransmits,
                bytes = stats.payload_bytes,
                "reply sent"
            );
        }
    }
}
