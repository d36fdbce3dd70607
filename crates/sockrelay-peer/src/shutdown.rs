use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide UP/DOWN flag observed by every polling loop.
///
/// Clones share the same flag. It only ever moves from UP to DOWN, and
/// raising it does nothing but store the new state, so it is safe to call
/// from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    down: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the flag to DOWN.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn trigger(&self) -> bool {
        !self.down.swap(true, Ordering::SeqCst)
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    pub fn is_up(&self) -> bool {
        !self.is_down()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn starts_up() {
        let flag = ShutdownFlag::new();
        assert!(flag.is_up());
        assert!(!flag.is_down());
    }

    #[test]
    fn trigger_is_monotonic_and_reports_first_transition() {
        let flag = ShutdownFlag::new();
        assert!(flag.trigger());
        assert!(!flag.trigger());
        assert!(flag.is_down());
    }

    #[test]
    fn clones_share_state() {
        let flag = ShutdownFlag::new();
        let handle = flag.clone();
        handle.trigger();
        assert!(flag.is_down());
    }

    #[test]
    fn exactly_one_concurrent_trigger_wins() {
        let flag = ShutdownFlag::new();
        let winners: usize = (0..8)
            .map(|_| {
                let flag = flag.clone();
                thread::spawn(move || flag.trigger())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| usize::from(handle.join().expect("trigger thread should finish")))
            .sum();

        assert_eq!(winners, 1);
    }
}
