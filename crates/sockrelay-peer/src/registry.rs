use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Identity of one connection handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Hands out increasing connection ids, starting at 1.
#[derive(Debug)]
pub struct ConnectionIds {
    next: AtomicU64,
}

impl ConnectionIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIds {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    live: HashMap<ConnectionId, Instant>,
    peak: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    state: Mutex<RegistryState>,
    emptied: Condvar,
}

/// Shared set of live connection handlers.
///
/// Clones share the same registry. The lock is held only for the duration
/// of a single mutation or query.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `id` live. Returns `false` if it already was.
    pub fn add(&self, id: ConnectionId) -> bool {
        let mut state = self.lock();
        let inserted = state.live.insert(id, Instant::now()).is_none();
        state.peak = state.peak.max(state.live.len());
        inserted
    }

    /// Forget `id`. Removing an absent id is a no-op.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut state = self.lock();
        let removed = state.live.remove(&id).is_some();
        if state.live.is_empty() {
            self.inner.emptied.notify_all();
        }
        removed
    }

    /// Add `id` and return a guard that removes it when dropped.
    pub fn register(&self, id: ConnectionId) -> Registration {
        self.add(id);
        debug!(connection = %id, "registered");
        Registration {
            registry: self.clone(),
            id,
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().live.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    /// Highest number of simultaneously live handlers seen.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.lock().live.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Block until every registered handler has deregistered.
    pub fn drain_all(&self) {
        let mut state = self.lock();
        while !state.live.is_empty() {
            state = self
                .inner
                .emptied
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`drain_all`](Self::drain_all) but gives up after `timeout`.
    ///
    /// Returns whether the registry is empty.
    pub fn drain_all_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !state.live.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .inner
                .emptied
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Live entry in a [`ConnectionRegistry`]; deregisters on drop.
#[derive(Debug)]
pub struct Registration {
    registry: ConnectionRegistry,
    id: ConnectionId,
}

impl Registration {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
        debug!(connection = %self.id, "deregistered");
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn add_then_remove_leaves_no_trace() {
        let registry = ConnectionRegistry::new();
        let ids = ConnectionIds::new();
        let id = ids.next_id();

        assert!(registry.add(id));
        assert!(registry.contains(id));
        assert!(registry.remove(id));

        assert!(registry.is_empty());
        assert!(!registry.contains(id));
        assert!(registry.ids().is_empty());
    }

    #[test]
    fn remove_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionIds::new().next_id();
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_sequential_and_display_as_conn() {
        let ids = ConnectionIds::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_eq!(first.to_string(), "conn-1");
        assert_eq!(second.get(), 2);
    }

    #[test]
    fn removal_order_does_not_matter() {
        let registry = ConnectionRegistry::new();
        let ids = ConnectionIds::new();
        let all: Vec<ConnectionId> = (0..5).map(|_| ids.next_id()).collect();
        for id in &all {
            registry.add(*id);
        }

        for id in [all[3], all[0], all[4], all[1], all[2]] {
            registry.remove(id);
        }
        assert!(registry.is_empty());
        assert_eq!(registry.peak(), 5);
    }

    #[test]
    fn concurrent_registrations_drain() {
        let registry = ConnectionRegistry::new();
        let ids = Arc::new(ConnectionIds::new());

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    let _registration = registry.register(ids.next_id());
                    thread::sleep(Duration::from_millis(5 * (i % 3) + 1));
                })
            })
            .collect();

        registry.drain_all();
        for worker in workers {
            worker.join().expect("worker should finish");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn guard_deregisters_on_drop() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionIds::new().next_id();

        let registration = registry.register(id);
        assert_eq!(registration.id(), id);
        assert!(registry.contains(id));

        drop(registration);
        assert!(!registry.contains(id));
    }

    #[test]
    fn guard_deregisters_on_panic() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionIds::new().next_id();

        let worker = {
            let registry = registry.clone();
            thread::spawn(move || {
                let _registration = registry.register(id);
                panic!("handler failure");
            })
        };
        assert!(worker.join().is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn drain_timeout_reports_stragglers() {
        let registry = ConnectionRegistry::new();
        let registration = registry.register(ConnectionIds::new().next_id());

        assert!(!registry.drain_all_timeout(Duration::from_millis(20)));
        drop(registration);
        assert!(registry.drain_all_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn drain_on_empty_registry_returns_immediately() {
        ConnectionRegistry::new().drain_all();
    }
}
