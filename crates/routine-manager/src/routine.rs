//! # Routine Trait
//!
//! The `Routine` trait is the contract every background service managed by the
//! [`RoutineManager`](crate::RoutineManager) implements: a stable name for log
//! correlation, a `start` that runs the service, and a `shutdown` that stops it.
//!
//! # Architecture Note
//! Writing the coordination logic against this trait means the manager never needs to
//! know whether it is driving an HTTP server, a queue consumer or a ticker. Each
//! implementation wraps the service's own start/stop API.
//!
//! `start` and `shutdown` are called on the *same* instance and may be in flight at the
//! same time (a server's `start` usually only returns once `shutdown` closed it), which is
//! why both take `&self` and routines are shared as `Arc<dyn Routine>`.

use crate::context::Context;
use crate::error::RoutineError;
use async_trait::async_trait;

/// A background service whose lifecycle is driven by the manager.
///
/// Each registered routine receives exactly one `start` call and, after the run context
/// is cancelled, exactly one `shutdown` call, whatever `start` returned.
///
/// ```rust
/// use async_trait::async_trait;
/// use routine_manager::{Context, Routine, RoutineError};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Routine for Heartbeat {
///     fn name(&self) -> &str {
///         "heartbeat"
///     }
///
///     async fn start(&self, ctx: Context) -> Result<(), RoutineError> {
///         ctx.cancelled().await;
///         ctx.check()?;
///         Ok(())
///     }
///
///     async fn shutdown(&self, _ctx: Context) -> Result<(), RoutineError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Routine: Send + Sync + 'static {
    /// Stable, process-unique name. Only used in log fields.
    fn name(&self) -> &str;

    /// Runs the service until it stops on its own or `ctx` is cancelled.
    ///
    /// Returning, with or without an error, is never a failure of the manager.
    async fn start(&self, ctx: Context) -> Result<(), RoutineError>;

    /// Stops the service, honoring `ctx`'s deadline as promptly as possible.
    async fn shutdown(&self, ctx: Context) -> Result<(), RoutineError>;

    /// Errors `start` returns as a normal consequence of `shutdown`
    /// (e.g. a "server closed" error). These are not logged as failures.
    fn is_ignored_start_error(&self, _err: &RoutineError) -> bool {
        false
    }
}
