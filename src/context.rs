//! Request context.
//!
//! Every backend operation takes a [`Context`] that is handed down to each
//! key-value call. It carries a request ID for log correlation, an optional
//! deadline, and a cancellation flag shared between clones. Store implementations
//! call [`Context::check`] before doing work. Lock acquisition inside the backend
//! does not observe the context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::storage::StorageError;

/// Deadline and cancellation carrier for a single request.
#[derive(Debug, Clone)]
pub struct Context {
    request_id: Uuid,
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// A context with no deadline that is never cancelled unless asked to.
    #[must_use]
    pub fn background() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().with_deadline(Instant::now() + timeout)
    }

    /// Returns this context with the given deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Identifier used to correlate log lines of one request.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`Context::cancel`] was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails if the request was cancelled or its deadline has passed.
    ///
    /// # Errors
    /// `StorageError::Cancelled` or `StorageError::DeadlineExceeded`.
    pub fn check(&self) -> Result<(), StorageError> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(StorageError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_context_passes_check() {
        let ctx = Context::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let ctx = Context::background();
        let clone = ctx.clone();
        clone.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check(), Err(StorageError::Cancelled)));
        assert_eq!(ctx.request_id(), clone.request_id());
    }

    #[test]
    fn expired_deadline_fails_check() {
        let ctx = Context::with_timeout(Duration::ZERO);
        assert!(matches!(ctx.check(), Err(StorageError::DeadlineExceeded)));
    }

    #[test]
    fn distinct_contexts_have_distinct_request_ids() {
        assert_ne!(
            Context::background().request_id(),
            Context::background().request_id()
        );
    }
}
