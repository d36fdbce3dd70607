use std::fs;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::RelayStream;

/// `sun_path` capacity: 108 bytes on Linux, 104 on the BSDs and macOS.
#[cfg(target_os = "linux")]
const SUN_PATH_MAX: usize = 108;
#[cfg(not(target_os = "linux"))]
const SUN_PATH_MAX: usize = 104;

/// Device and inode of the socket file this listener created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    fn of(metadata: &fs::Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }
}

/// Listener on a filesystem-path Unix domain socket.
///
/// Accepts without blocking once readiness was reported. The socket file is
/// unlinked on `Drop`, but only if it is still the file this listener
/// created.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: FileIdentity,
}

impl UnixDomainSocket {
    /// Owner-only access for the socket file.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind `path` with [`Self::DEFAULT_SOCKET_MODE`].
    ///
    /// A leftover socket file at `path` is removed first. Any other kind of
    /// file makes the bind fail.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= SUN_PATH_MAX {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: SUN_PATH_MAX,
            });
        }

        let fail = |source: io::Error| TransportError::Bind {
            endpoint: format!("unix:{}", path.display()),
            source,
        };

        clear_stale(&path).map_err(fail)?;
        let listener = UnixListener::bind(&path).map_err(fail)?;
        listener.set_nonblocking(true).map_err(fail)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).map_err(fail)?;
        let identity = fs::symlink_metadata(&path)
            .map(|metadata| FileIdentity::of(&metadata))
            .map_err(fail)?;

        info!(path = %path.display(), mode = %format!("{mode:o}"), "unix listener bound");
        Ok(Self {
            listener,
            path,
            identity,
        })
    }

    /// Take one pending connection. Call after readiness was reported; the
    /// returned stream blocks.
    pub fn accept(&self) -> Result<RelayStream> {
        let (stream, _) = self.listener.accept().map_err(TransportError::Accept)?;
        stream
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;
        Ok(RelayStream::from_unix(stream))
    }

    pub fn connect(path: impl AsRef<Path>) -> Result<RelayStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            endpoint: format!("unix:{}", path.display()),
            source,
        })?;
        debug!(path = %path.display(), "unix stream connected");
        Ok(RelayStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn still_owns_path(&self) -> bool {
        fs::symlink_metadata(&self.path).is_ok_and(|metadata| {
            metadata.file_type().is_socket() && FileIdentity::of(&metadata) == self.identity
        })
    }
}

/// Remove a socket file left behind by an earlier run.
fn clear_stale(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a unix socket",
        ));
    }
    debug!(path = %path.display(), "removing stale socket file");
    fs::remove_file(path)
}

impl AsRawFd for UnixDomainSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if self.still_owns_path() {
            let _ = fs::remove_file(&self.path);
            debug!(path = %self.path.display(), "socket file removed");
        } else {
            debug!(path = %self.path.display(), "socket file replaced; left in place");
        }
    }
}

impl std::fmt::Debug for UnixDomainSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixDomainSocket")
            .field("path", &self.path)
            .finish()
    }
}
