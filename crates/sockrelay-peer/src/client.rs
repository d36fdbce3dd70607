use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use sockrelay_frame::{ClientProfile, LinkConfig};
use sockrelay_transport::Endpoint;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::{PeerError, Result};
use crate::server::DEFAULT_POLL_INTERVAL;
use crate::shutdown::ShutdownFlag;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long each wait lasts before re-checking the shutdown flag.
    pub poll_interval: Duration,
    pub link: LinkConfig,
    /// Give up on a reply after this long. `None` waits until shutdown.
    pub reply_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            link: LinkConfig::default(),
            reply_timeout: None,
        }
    }
}

/// A connected client with a fixed profile.
#[derive(Debug)]
pub struct Client {
    connection: Connection,
    profile: ClientProfile,
    config: ClientConfig,
    shutdown: ShutdownFlag,
}

impl Client {
    /// Connect and perform the handshake with default configuration.
    pub fn connect(endpoint: &Endpoint, profile: ClientProfile) -> Result<Self> {
        Self::connect_with_config(endpoint, profile, ClientConfig::default())
    }

    pub fn connect_with_config(
        endpoint: &Endpoint,
        profile: ClientProfile,
        config: ClientConfig,
    ) -> Result<Self> {
        let connection = Connection::connect(endpoint, profile, &config.link)?;
        info!(%endpoint, %profile, "connected");
        Ok(Self::from_connection(connection, profile, config))
    }

    pub(crate) fn from_connection(
        connection: Connection,
        profile: ClientProfile,
        config: ClientConfig,
    ) -> Self {
        Self {
            connection,
            profile,
            config,
            shutdown: ShutdownFlag::new(),
        }
    }

    /// Use an externally owned flag, e.g. one a signal handler raises.
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn profile(&self) -> ClientProfile {
        self.profile
    }

    /// Send one command and wait for its reply.
    ///
    /// Returns `None` if the server went away.
    pub fn request(&mut self, command: &str) -> Result<Option<String>> {
        match self.exchange(command) {
            Err(err) if err.is_disconnect() => Ok(None),
            other => other,
        }
    }

    fn exchange(&mut self, command: &str) -> Result<Option<String>> {
        self.connection.send_message(command.as_bytes())?;

        let started = Instant::now();
        while !self.connection.poll_readable(self.config.poll_interval)? {
            if self.shutdown.is_down() {
                return Err(PeerError::Interrupted);
            }
            if let Some(limit) = self.config.reply_timeout {
                if started.elapsed() >= limit {
                    return Err(PeerError::Timeout(limit));
                }
            }
        }
        self.read_reply()
    }

    /// Read marker and reply once the socket is readable.
    fn read_reply(&mut self) -> Result<Option<String>> {
        if !self.connection.read_reply_marker()? {
            return Ok(None);
        }
        Ok(self
            .connection
            .recv_message()?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Announce the disconnect and close the socket.
    pub fn close(mut self) -> Result<()> {
        let sent = self.connection.send_goodbye();
        self.connection.close();
        match sent {
            Err(err) if err.is_disconnect() => Ok(()),
            other => other,
        }
    }
}

/// Supplies input lines to an interactive session. `None` ends the input.
pub trait LineSource: Send {
    fn next_line(&mut self) -> Option<String>;
}

impl<I> LineSource for I
where
    I: Iterator<Item = String> + Send,
{
    fn next_line(&mut self) -> Option<String> {
        self.next()
    }
}

/// Whose move it is on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Sending,
    Receiving,
}

/// How an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Input ran out; the goodbye was sent.
    InputClosed,
    /// The server closed the connection.
    ServerDown,
    /// The shutdown flag went DOWN.
    Interrupted,
}

/// Interactive request/reply loop that stays responsive to shutdown.
#[derive(Debug)]
pub struct ClientSession {
    client: Client,
    turn: Turn,
    exchanges: u64,
}

impl ClientSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            turn: Turn::Sending,
            exchanges: 0,
        }
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn shutdown_handle(&self) -> ShutdownFlag {
        self.client.shutdown_handle()
    }

    /// Send each line from `lines` and pass every reply to `sink`.
    ///
    /// Lines are read on a separate thread, so waiting for input never
    /// delays noticing shutdown or a vanished server. A reply that takes
    /// longer than `reply_timeout` ends the session with
    /// [`PeerError::Timeout`].
    pub fn run<S, K>(mut self, lines: S, mut sink: K) -> Result<SessionEnd>
    where
        S: LineSource + 'static,
        K: FnMut(&str),
    {
        let (tx, rx) = mpsc::channel::<String>();
        thread::Builder::new()
            .name("sockrelay-input".to_string())
            .spawn(move || {
                let mut lines = lines;
                while let Some(line) = lines.next_line() {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            })
            .map_err(PeerError::Spawn)?;

        let poll = self.client.config.poll_interval;
        let mut sent_at = Instant::now();
        loop {
            if self.client.shutdown.is_down() {
                self.leave();
                return Ok(SessionEnd::Interrupted);
            }

            match self.turn {
                Turn::Sending => match rx.recv_timeout(poll) {
                    Ok(line) => match self.client.connection.send_message(line.as_bytes()) {
                        Ok(_) => {
                            debug!(line = %line, "request sent");
                            sent_at = Instant::now();
                            self.turn = Turn::Receiving;
                        }
                        Err(err) if err.is_disconnect() => return Ok(self.server_down()),
                        Err(err) => return Err(err),
                    },
                    Err(RecvTimeoutError::Timeout) => {
                        // The server never speaks out of turn, so readable
                        // here means it closed the connection.
                        if self.client.connection.poll_readable(Duration::ZERO)? {
                            return Ok(self.server_down());
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        self.leave();
                        info!(exchanges = self.exchanges, "input closed; session ended");
                        return Ok(SessionEnd::InputClosed);
                    }
                },
                Turn::Receiving => {
                    if !self.client.connection.poll_readable(poll)? {
                        if let Some(limit) = self.client.config.reply_timeout {
                            if sent_at.elapsed() >= limit {
                                // A late reply would be read as the answer to
                                // the next line, so the connection is dropped.
                                self.leave();
                                info!(exchanges = self.exchanges, ?limit, "no reply in time; session ended");
                                return Err(PeerError::Timeout(limit));
                            }
                        }
                        continue;
                    }
                    match self.client.read_reply() {
                        Ok(Some(reply)) => {
                            self.exchanges += 1;
                            sink(&reply);
                            self.turn = Turn::Sending;
                        }
                        Ok(None) => return Ok(self.server_down()),
                        Err(err) if err.is_disconnect() => return Ok(self.server_down()),
                        Err(err) => return Err(err),
                    }
                }
            }
        }
    }

    fn server_down(&mut self) -> SessionEnd {
        self.client.shutdown.trigger();
        info!(exchanges = self.exchanges, "server went away");
        SessionEnd::ServerDown
    }

    fn leave(&mut self) {
        if let Err(err) = self.client.connection.send_goodbye() {
            debug!(error = %err, "goodbye not delivered");
        }
        self.client.connection.close();
    }
}
