//! Query-scoped cancellation and timeout plumbing.
//!
//! Every plugin call observes the query's [`CancellationToken`]; fan-out
//! operators clone the token into each task so one cancel reaches all of
//! them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A handle for cancelling an in-flight query.
///
/// Can be shared between tasks to allow cancellation from outside the
/// query execution path.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests cancellation of the associated query.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks whether cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-query context carried into every plugin call.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub cancel: CancellationToken,
    /// Optional per-call timeout; `None` means the call may run unbounded.
    pub timeout: Option<Duration>,
}

impl QueryContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cancellation_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn context_defaults() {
        let ctx = QueryContext::new();
        assert!(!ctx.is_cancelled());
        assert!(ctx.timeout.is_none());

        let bounded = QueryContext::new().with_timeout(Duration::from_secs(5));
        assert_eq!(bounded.timeout, Some(Duration::from_secs(5)));
    }
}
