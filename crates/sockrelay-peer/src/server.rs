use std::net::SocketAddr;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sockrelay_frame::LinkConfig;
use sockrelay_transport::Family;
use tracing::{error, info, warn};

use crate::backend::Dispatcher;
use crate::connection::Connection;
use crate::error::{PeerError, Result};
use crate::handler::ConnectionHandler;
use crate::handshake::HandshakeConfig;
use crate::listener::{ListenerConfig, MultiListener};
use crate::registry::{ConnectionIds, ConnectionRegistry};
use crate::shutdown::ShutdownFlag;

/// How long every loop waits before re-checking the shutdown flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listener: ListenerConfig,
    pub poll_interval: Duration,
    pub link: LinkConfig,
    pub handshake: HandshakeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            link: LinkConfig::default(),
            handshake: HandshakeConfig::default(),
        }
    }
}

/// Totals reported once the server has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerSummary {
    pub accepted: u64,
    pub peak_live: usize,
}

/// Multi-family server: one thread per connection, cooperative shutdown.
pub struct Server {
    listener: MultiListener,
    config: ServerConfig,
    dispatcher: Dispatcher,
    registry: ConnectionRegistry,
    shutdown: ShutdownFlag,
    ids: ConnectionIds,
}

impl Server {
    /// Bind every configured endpoint. Nothing is accepted until [`run`](Self::run).
    pub fn bind(config: ServerConfig, dispatcher: Dispatcher) -> Result<Self> {
        let listener = MultiListener::bind(&config.listener)?;
        Ok(Self {
            listener,
            config,
            dispatcher,
            registry: ConnectionRegistry::new(),
            shutdown: ShutdownFlag::new(),
            ids: ConnectionIds::new(),
        })
    }

    /// Use an externally owned flag, e.g. one a signal handler raises.
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Handle that stops the server when triggered from any thread.
    pub fn shutdown_handle(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> ConnectionRegistry {
        self.registry.clone()
    }

    pub fn families(&self) -> Vec<Family> {
        self.listener.families()
    }

    pub fn unix_path(&self) -> Option<&Path> {
        self.listener.unix_path()
    }

    pub fn tcp_addr(&self, family: Family) -> Option<SocketAddr> {
        self.listener.tcp_addr(family)
    }

    /// Accept and serve until the shutdown flag goes DOWN, then wait for
    /// every connection to finish and release the listeners.
    pub fn run(self) -> Result<ServerSummary> {
        info!(
            families = ?self.listener.families(),
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "server running"
        );

        let mut workers = Vec::new();
        let outcome = self.accept_loop(&mut workers);

        let live = self.registry.len();
        info!(live, "shutting down; waiting for connections to finish");
        self.registry.drain_all();
        for worker in workers {
            if worker.join().is_err() {
                warn!("connection thread panicked");
            }
        }

        let summary = ServerSummary {
            accepted: outcome.as_ref().copied().unwrap_or(0),
            peak_live: self.registry.peak(),
        };
        drop(self.listener);
        info!(
            accepted = summary.accepted,
            peak_live = summary.peak_live,
            "server stopped"
        );

        outcome.map(|_| summary)
    }

    fn accept_loop(&self, workers: &mut Vec<JoinHandle<()>>) -> Result<u64> {
        let mut accepted = 0u64;
        while self.shutdown.is_up() {
            let streams = match self.listener.accept_ready(self.config.poll_interval) {
                Ok(streams) => streams,
                Err(err) => {
                    error!(error = %err, "listener failed; stopping");
                    self.shutdown.trigger();
                    return Err(err);
                }
            };

            for stream in streams {
                accepted += 1;
                let id = self.ids.next_id();
                info!(connection = %id, family = %stream.family(), peer = %stream.peer_label(), "accepted");

                let registry = self.registry.clone();
                let dispatcher = self.dispatcher.clone();
                let shutdown = self.shutdown.clone();
                let config = self.config.clone();

                let spawned = thread::Builder::new()
                    .name(format!("sockrelay-conn-{}", id.get()))
                    .spawn(move || {
                        let handshake = HandshakeConfig {
                            poll_interval: config.poll_interval,
                            ..config.handshake.clone()
                        };
                        match Connection::accept(stream, &handshake, &config.link, &shutdown) {
                            Ok(connection) => {
                                ConnectionHandler::new(
                                    id,
                                    connection,
                                    dispatcher,
                                    shutdown,
                                    config.poll_interval,
                                )
                                .run(&registry);
                            }
                            Err(PeerError::Interrupted) => {
                                info!(connection = %id, "shutdown before handshake; dropping connection");
                            }
                            Err(err) => {
                                warn!(connection = %id, error = %err, "handshake failed; dropping connection");
                            }
                        }
                    });

                match spawned {
                    Ok(handle) => workers.push(handle),
                    Err(err) => {
                        let err = PeerError::Spawn(err);
                        warn!(connection = %id, error = %err, "dropping connection");
                    }
                }
            }

            reap(workers);
        }
        Ok(accepted)
    }
}

/// Join threads that already finished so the list tracks live ones only.
fn reap(workers: &mut Vec<JoinHandle<()>>) {
    let (done, live): (Vec<_>, Vec<_>) = workers.drain(..).partition(JoinHandle::is_finished);
    *workers = live;
    for handle in done {
        if handle.join().is_err() {
            warn!("connection thread panicked");
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listener", &self.listener)
            .field("poll_interval", &self.config.poll_interval)
            .field("live", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Instant;

    use sockrelay_frame::ClientProfile;
    use sockrelay_transport::Endpoint;

    use super::*;
    use crate::testutil::{cleanup, make_sock_path};

    fn test_config(path: &Path) -> ServerConfig {
        ServerConfig {
            listener: ListenerConfig {
                unix_path: Some(path.to_path_buf()),
                ipv4: Some(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))),
                ipv6: None,
            },
            poll_interval: Duration::from_millis(10),
            ..ServerConfig::default()
        }
    }

    fn upper_dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(|command: &str| command.to_uppercase()),
            Arc::new(|_: &str| "sys".to_string()),
        )
    }

    #[test]
    fn serves_unix_and_tcp_then_stops_on_flag() {
        let path = make_sock_path("server-run");
        let server = Server::bind(test_config(&path), upper_dispatcher()).expect("server should bind");
        let tcp = server.tcp_addr(Family::Ipv4).expect("ipv4 should be bound");
        let shutdown = server.shutdown_handle();
        let registry = server.registry();
        let running = thread::spawn(move || server.run());

        for endpoint in [Endpoint::Unix(path.clone()), Endpoint::Tcp(tcp)] {
            let mut conn = Connection::connect(&endpoint, ClientProfile::A, &LinkConfig::default())
                .expect("client should connect");
            conn.send_message(b"hello").expect("request should send");
            assert!(conn.read_reply_marker().expect("marker should arrive"));
            let reply = conn.recv_message().expect("reply should arrive");
            assert_eq!(reply.as_deref(), Some(b"HELLO".as_ref()));
            conn.send_goodbye().expect("goodbye should send");
        }

        assert!(shutdown.trigger());
        let summary = running
            .join()
            .expect("server thread should finish")
            .expect("server should stop cleanly");

        assert_eq!(summary.accepted, 2);
        assert!(summary.peak_live >= 1);
        assert!(registry.is_empty());
        assert!(!path.exists());
        cleanup(&path);
    }

    #[test]
    fn shutdown_waits_for_idle_connections_within_bound() {
        let path = make_sock_path("server-drain");
        let server = Server::bind(test_config(&path), upper_dispatcher()).expect("server should bind");
        let shutdown = server.shutdown_handle();
        let registry = server.registry();
        let running = thread::spawn(move || server.run());

        let idle: Vec<Connection> = (0..3)
            .map(|_| {
                Connection::connect(&Endpoint::Unix(path.clone()), ClientProfile::C, &LinkConfig::default())
                    .expect("client should connect")
            })
            .collect();

        for _ in 0..200 {
            if registry.len() == 3 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(registry.len(), 3);

        let started = Instant::now();
        shutdown.trigger();
        let summary = running
            .join()
            .expect("server thread should finish")
            .expect("server should stop cleanly");

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.peak_live, 3);
        assert!(registry.is_empty());
        drop(idle);
        cleanup(&path);
    }

    #[test]
    fn silent_client_is_dropped_after_handshake_timeout() {
        let path = make_sock_path("server-silent");
        let mut config = test_config(&path);
        config.handshake.timeout = Duration::from_millis(30);
        let server = Server::bind(config, upper_dispatcher()).expect("server should bind");
        let shutdown = server.shutdown_handle();
        let registry = server.registry();
        let running = thread::spawn(move || server.run());

        let _silent = std::os::unix::net::UnixStream::connect(&path).expect("client should connect");
        thread::sleep(Duration::from_millis(150));
        assert!(registry.is_empty());

        shutdown.trigger();
        let summary = running
            .join()
            .expect("server thread should finish")
            .expect("server should stop cleanly");
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.peak_live, 0);
        cleanup(&path);
    }

    #[test]
    fn shutdown_does_not_wait_out_a_silent_handshake() {
        let path = make_sock_path("server-silent-shutdown");
        let mut config = test_config(&path);
        config.handshake.timeout = Duration::from_secs(5);
        let server = Server::bind(config, upper_dispatcher()).expect("server should bind");
        let shutdown = server.shutdown_handle();
        let running = thread::spawn(move || server.run());

        let _silent = std::os::unix::net::UnixStream::connect(&path).expect("client should connect");
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        shutdown.trigger();
        let summary = running
            .join()
            .expect("server thread should finish")
            .expect("server should stop cleanly");

        let waited = started.elapsed();
        assert!(
            waited < Duration::from_secs(1),
            "shutdown took {waited:?} with a client still in the handshake"
        );
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.peak_live, 0);
        cleanup(&path);
    }

    #[test]
    fn serves_all_three_families_at_once() {
        use sockrelay_transport::TransportError;

        let path = make_sock_path("server-three");
        let mut config = test_config(&path);
        config.listener.ipv6 = Some(SocketAddr::from((std::net::Ipv6Addr::LOCALHOST, 0)));
        let server = match Server::bind(config, upper_dispatcher()) {
            Ok(server) => server,
            Err(PeerError::Transport(TransportError::Bind { ref endpoint, .. }))
                if endpoint.contains("::1") =>
            {
                eprintln!("skipping: no IPv6 loopback on this host");
                cleanup(&path);
                return;
            }
            Err(err) => panic!("server should bind: {err}"),
        };
        assert_eq!(server.families().len(), 3);
        let v4 = server.tcp_addr(Family::Ipv4).expect("ipv4 should be bound");
        let v6 = server.tcp_addr(Family::Ipv6).expect("ipv6 should be bound");
        assert!(v6.is_ipv6());
        let shutdown = server.shutdown_handle();
        let registry = server.registry();
        let running = thread::spawn(move || server.run());

        let endpoints = [Endpoint::Unix(path.clone()), Endpoint::Tcp(v4), Endpoint::Tcp(v6)];
        let mut open: Vec<Connection> = endpoints
            .iter()
            .map(|endpoint| {
                Connection::connect(endpoint, ClientProfile::B, &LinkConfig::default())
                    .expect("client should connect")
            })
            .collect();

        for (conn, word) in open.iter_mut().zip(["unix", "four", "six"]) {
            conn.send_message(word.as_bytes()).expect("request should send");
            assert!(conn.read_reply_marker().expect("marker should arrive"));
            let reply = conn.recv_message().expect("reply should arrive");
            assert_eq!(reply, Some(word.to_uppercase().into_bytes()), "{}", conn.family());
        }
        assert_eq!(open[2].family(), Family::Ipv6);
        assert_eq!(registry.len(), 3);

        shutdown.trigger();
        let summary = running
            .join()
            .expect("server thread should finish")
            .expect("server should stop cleanly");
        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.peak_live, 3);
        drop(open);
        cleanup(&path);
    }
}
