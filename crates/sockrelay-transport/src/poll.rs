//! Bounded readiness waits over raw descriptors.
//!
//! Every blocking loop in sockrelay waits here with a short timeout so it
//! can re-check the shutdown flag between waits.

use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::Result;

/// Wait up to `timeout` for any of `fds` to become readable.
///
/// Returns one flag per descriptor, in input order. A timeout, or a wait
/// interrupted by a signal, reports every descriptor as not ready.
pub fn poll_readable(fds: &[RawFd], timeout: Duration) -> Result<Vec<bool>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    // SAFETY: `pollfds` is a valid, exclusively borrowed array of
    // `pollfds.len()` initialized `pollfd` structs for the whole call.
    let rc = unsafe {
        libc::poll(
            pollfds.as_mut_ptr(),
            pollfds.len() as libc::nfds_t,
            timeout_millis(timeout),
        )
    };

    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            return Ok(vec![false; fds.len()]);
        }
        return Err(err.into());
    }

    pollfds
        .iter()
        .map(|pfd| {
            if pfd.revents & libc::POLLNVAL != 0 {
                return Err(std::io::Error::from_raw_os_error(libc::EBADF).into());
            }
            Ok(pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        })
        .collect()
}

/// Single-descriptor form of [`poll_readable`].
pub fn wait_readable(fd: RawFd, timeout: Duration) -> Result<bool> {
    Ok(poll_readable(&[fd], timeout)?
        .first()
        .copied()
        .unwrap_or(false))
}

// poll(2) counts whole milliseconds; a non-zero sub-millisecond timeout is
// rounded up so it never degrades into a busy spin.
fn timeout_millis(timeout: Duration) -> libc::c_int {
    if timeout.is_zero() {
        return 0;
    }
    let millis = timeout.as_millis().max(1);
    millis.min(libc::c_int::MAX as u128) as libc::c_int
}
