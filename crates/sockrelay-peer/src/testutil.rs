use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use sockrelay_frame::{ClientProfile, LinkConfig};
use sockrelay_transport::{Endpoint, RelayStream, UnixDomainSocket};

use crate::connection::Connection;
use crate::handshake::HandshakeConfig;
use crate::shutdown::ShutdownFlag;

pub(crate) fn make_sock_path(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/sockrelay-{}-{}-{}",
        tag,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir.join("test.sock")
}

pub(crate) fn cleanup(path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::remove_dir_all(parent);
    }
}

pub(crate) fn accept_blocking(listener: &UnixDomainSocket) -> RelayStream {
    loop {
        match listener.accept() {
            Ok(stream) => return stream,
            Err(err) if err.is_spurious_accept() => thread::sleep(Duration::from_millis(2)),
            Err(err) => panic!("accept failed: {err}"),
        }
    }
}

/// Server and client ends of one handshaken Unix connection.
pub(crate) fn connected(tag: &str, profile: ClientProfile) -> (Connection, Connection, PathBuf) {
    let path = make_sock_path(tag);
    let listener = UnixDomainSocket::bind(&path).expect("listener should bind");
    let endpoint = Endpoint::Unix(path.clone());

    let client = thread::spawn(move || {
        Connection::connect(&endpoint, profile, &LinkConfig::default())
            .expect("client should connect")
    });
    let server = Connection::accept(
        accept_blocking(&listener),
        &HandshakeConfig::default(),
        &LinkConfig::default(),
        &ShutdownFlag::new(),
    )
    .expect("server handshake should succeed");
    let client = client.join().expect("client thread should finish");

    (server, client, path)
}
