//! Cooperative cancellation for sync passes

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation signal shared by everything taking part in one sync pass
///
/// Cloning yields another handle to the same flag. Once requested, a
/// cancellation is never cleared; every pass gets a fresh flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the pass
    ///
    /// Safe to call from any thread, any number of times.
    pub fn request_cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            log::debug!("Cancellation requested");
        }
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_flag_is_unset() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_request_cancel_is_idempotent() {
        let flag = CancellationFlag::new();
        flag.request_cancel();
        flag.request_cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        handle.request_cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        std::thread::spawn(move || handle.request_cancel())
            .join()
            .unwrap();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_fresh_flags_are_independent() {
        let first = CancellationFlag::new();
        first.request_cancel();
        let second = CancellationFlag::new();
        assert!(!second.is_cancelled());
    }
}
