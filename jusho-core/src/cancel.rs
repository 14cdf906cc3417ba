//! Cooperative cancellation shared between an invoker and long-running work.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Shared cancellation flag with an optional deadline.
///
/// Clones observe the same flag, so an invoker can keep one handle and pass
/// another to the worker. The token reports cancellation once [`cancel`] has
/// been called on any clone or the deadline has passed.
///
/// [`cancel`]: CancellationToken::cancel
///
/// # Examples
/// ```
/// use jusho_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker = token.clone();
/// assert!(!worker.is_cancelled());
/// token.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Create a token that is not cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a deadline `timeout` from now. Timeouts too large to represent
    /// leave the token without a deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Request cancellation for every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested or the deadline has elapsed.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The configured deadline, if any.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
