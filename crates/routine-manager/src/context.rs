//! # Run & Shutdown Contexts
//!
//! A [`Context`] is the signal handed to every [`Routine`](crate::Routine) call. It is a
//! cloneable cancellation token that optionally carries a deadline and remembers *why* it
//! was cancelled, so routines and the manager can tell an explicit cancel apart from an
//! expired deadline.
//!
//! Two contexts exist during a manager's lifetime:
//!
//! - the **run context**, supplied by the caller (see [`notify_shutdown`](crate::notify_shutdown));
//!   its cancellation is what moves the manager into shutdown.
//! - the **shutdown context**, created by the manager with
//!   [`Context::with_timeout`] once shutdown begins. It is independent of the run context.
//!
//! ```rust
//! use routine_manager::{Context, ContextError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (ctx, cancel) = Context::with_cancel();
//!     assert!(ctx.err().is_none());
//!
//!     cancel.cancel();
//!     ctx.cancelled().await;
//!     assert_eq!(ctx.err(), Some(ContextError::Canceled));
//! }
//! ```

use crate::error::ContextError;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation signal with an optional deadline.
#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    cause: Arc<OnceLock<ContextError>>,
    deadline: Option<Instant>,
}

/// Cancels the [`Context`] it was created with. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: CancellationToken,
    cause: Arc<OnceLock<ContextError>>,
}

impl Context {
    /// Creates a context that is only cancelled through the returned handle.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let token = CancellationToken::new();
        let cause = Arc::new(OnceLock::new());
        let handle = CancelHandle {
            token: token.clone(),
            cause: cause.clone(),
        };
        let ctx = Self {
            token,
            cause,
            deadline: None,
        };
        (ctx, handle)
    }

    /// Creates a context that cancels itself `period` from now.
    ///
    /// Must be called from within a Tokio runtime: the deadline is driven by a
    /// background timer task that exits as soon as the context is cancelled.
    /// A period too large to be represented as an instant yields a context with
    /// no deadline.
    pub fn with_timeout(period: Duration) -> (Self, CancelHandle) {
        match Instant::now().checked_add(period) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::with_cancel(),
        }
    }

    /// Creates a context that cancels itself at `deadline`.
    pub fn with_deadline(deadline: Instant) -> (Self, CancelHandle) {
        let (mut ctx, handle) = Self::with_cancel();
        ctx.deadline = Some(deadline);

        let token = ctx.token.clone();
        let cause = ctx.cause.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = cause.set(ContextError::DeadlineExceeded);
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        });

        (ctx, handle)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled, either explicitly or by its deadline.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// `None` while the context is live, otherwise the reason it stopped.
    pub fn err(&self) -> Option<ContextError> {
        if !self.token.is_cancelled() {
            return None;
        }
        // The cause is recorded before the token is cancelled; a token cancelled
        // without a recorded cause can only come from an explicit cancel.
        Some(self.cause.get().copied().unwrap_or(ContextError::Canceled))
    }

    /// Convenience for routines: `Err` once the context is done.
    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl CancelHandle {
    /// Cancels the context. Later calls, and a deadline firing afterwards, are no-ops.
    pub fn cancel(&self) {
        let _ = self.cause.set(ContextError::Canceled);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_cancel_reports_canceled() {
        let (ctx, cancel) = Context::with_cancel();
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_none());

        cancel.cancel();
        cancel.cancel();

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_deadline_exceeded() {
        let started = Instant::now();
        let (ctx, _cancel) = Context::with_timeout(Duration::from_millis(50));
        assert_eq!(ctx.deadline(), Some(started + Duration::from_millis(50)));

        ctx.cancelled().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50), "fired early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(60), "fired late: {elapsed:?}");
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_deadline_keeps_canceled_cause() {
        let (ctx, cancel) = Context::with_timeout(Duration::from_millis(50));
        cancel.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(ctx.check(), Err(ContextError::Canceled));
    }

    #[tokio::test]
    async fn unrepresentable_timeout_has_no_deadline() {
        let (ctx, cancel) = Context::with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_none());
        assert!(ctx.err().is_none());

        cancel.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[tokio::test]
    async fn clones_share_cancellation() {
        let (ctx, cancel) = Context::with_cancel();
        let clone = ctx.clone();

        let waiter = tokio::spawn(async move {
            clone.cancelled().await;
            clone.err()
        });
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), Some(ContextError::Canceled));
    }
}
