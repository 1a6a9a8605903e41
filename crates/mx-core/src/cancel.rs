//! Cooperative cancellation for compile and generation stages

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation flag plus an optional deadline.
///
/// Clones share the same flag. Long-running stages poll
/// [`is_cancelled`](Self::is_cancelled) between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token that is never cancelled unless [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested or the deadline passed
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
