//! Command backends the server dispatches requests to.

pub mod journal;
pub mod sysinfo;

use std::sync::Arc;

use sockrelay_peer::Dispatcher;

pub use journal::JournalBackend;
pub use sysinfo::SystemInfoBackend;

/// Dispatcher wired to `journalctl` and the local system-info probe.
pub fn default_dispatcher() -> Dispatcher {
    Dispatcher::new(
        Arc::new(JournalBackend::default()),
        Arc::new(SystemInfoBackend::default()),
    )
}
