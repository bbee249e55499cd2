//! # Routine Manager
//!
//! This module defines [`RoutineManager`], the orchestrator that starts every registered
//! [`Routine`], waits for the run context to be cancelled, and then drives a concurrent,
//! deadline-bounded shutdown.
//!
//! ## Lifecycle
//!
//! ```text
//! register()* ──► run(ctx) ──► Running ──(ctx cancelled)──► ShuttingDown ─┬─► CleanlyStopped
//!                                                                         └─► ForcedStop
//! ```
//!
//! - **Registration** happens on an owned `RoutineManager`. [`RoutineManager::run`] consumes
//!   it, so nothing can be registered once the run phase begins and a manager runs once.
//! - **Start**: one Tokio task per routine calls `start(run_ctx)`. Start tasks are detached;
//!   the manager never waits on them and never aborts them.
//! - **Shutdown**: once the run context is cancelled, a fresh context bounded by the
//!   graceful period is created and one task per routine calls `shutdown(bounded_ctx)`.
//! - **Exit decision**: joining every shutdown task races the bounded context's deadline.
//!   Whichever resolves first decides the [`ShutdownOutcome`]; completing on the very tick
//!   the deadline fires counts as a forced stop. Losing the race abandons the
//!   outstanding tasks (their handles are dropped, which detaches them) instead of
//!   cancelling them.
//!
//! ## Error Handling
//!
//! Routine errors are only ever logged, tagged with the routine's name:
//!
//! | Error | Level |
//! |-------|-------|
//! | cancellation ([`RoutineError::is_cancellation`]) | debug |
//! | ignored start error ([`Routine::is_ignored_start_error`]) | debug |
//! | anything else | error |
//! | routine returned after the graceful deadline | warn |
//! | graceful period elapsed with shutdowns outstanding | error |
//! | start or shutdown task panicked | error |
//!
//! Spawned tasks inherit the caller's current span, so instrumenting the `run` future
//! (for example with [`LogOptions::component_span`](crate::LogOptions::component_span))
//! tags every routine log line.
//!
//! [`RoutineError::is_cancellation`]: crate::RoutineError::is_cancellation

use crate::config::ManagerConfig;
use crate::context::Context;
use crate::error::ContextError;
use crate::outcome::ShutdownOutcome;
use crate::routine::Routine;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Starts and stops a fixed set of routines.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use routine_manager::{
///     Context, ManagerConfig, Routine, RoutineError, RoutineManager, ShutdownOutcome,
/// };
/// use std::time::Duration;
///
/// struct Worker;
///
/// #[async_trait]
/// impl Routine for Worker {
///     fn name(&self) -> &str { "worker" }
///     async fn start(&self, ctx: Context) -> Result<(), RoutineError> {
///         ctx.cancelled().await;
///         ctx.check()?;
///         Ok(())
///     }
///     async fn shutdown(&self, _ctx: Context) -> Result<(), RoutineError> { Ok(()) }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let config = ManagerConfig::with_graceful_shutdown_period(Duration::from_secs(1));
///     let mut manager = RoutineManager::new(config);
///     manager.register(Worker);
///
///     let (ctx, cancel) = Context::with_cancel();
///     let run = tokio::spawn(manager.run(ctx));
///
///     cancel.cancel();
///     assert_eq!(run.await.unwrap(), ShutdownOutcome::CleanlyStopped);
/// }
/// ```
pub struct RoutineManager {
    graceful_shutdown_period: Duration,
    routines: Vec<Arc<dyn Routine>>,
}

impl RoutineManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            graceful_shutdown_period: config.effective_graceful_shutdown_period(),
            routines: Vec::new(),
        }
    }

    pub fn graceful_shutdown_period(&self) -> Duration {
        self.graceful_shutdown_period
    }

    /// Registers a routine. Registration order is kept for diagnostics only.
    pub fn register<R: Routine>(&mut self, routine: R) {
        self.register_shared(Arc::new(routine));
    }

    /// Registers a routine the caller keeps a handle to.
    pub fn register_shared(&mut self, routine: Arc<dyn Routine>) {
        debug!(routine = routine.name(), "Registered routine");
        self.routines.push(routine);
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    pub fn routine_names(&self) -> impl Iterator<Item = &str> {
        self.routines.iter().map(|r| r.name())
    }

    /// Runs every routine until `ctx` is cancelled, then shuts them all down.
    ///
    /// Returns once every `shutdown` call has returned, or once the graceful period
    /// elapsed, whichever comes first. The caller decides what to do with the outcome
    /// (typically converting it into the process exit status).
    pub async fn run(self, ctx: Context) -> ShutdownOutcome {
        let period = self.graceful_shutdown_period;
        let routines: Arc<[Arc<dyn Routine>]> = self.routines.into();

        info!(routines = routines.len(), "Starting routines");
        for routine in routines.iter() {
            spawn_start(routine.clone(), ctx.clone());
        }

        ctx.cancelled().await;
        info!(graceful_period = ?period, "Shutdown triggered, stopping routines");

        let (shutdown_ctx, release) = Context::with_timeout(period);
        let mut handles: Vec<(Arc<dyn Routine>, JoinHandle<()>)> = routines
            .iter()
            .map(|routine| {
                let handle = spawn_shutdown(routine.clone(), shutdown_ctx.clone());
                (routine.clone(), handle)
            })
            .collect();

        let outcome = tokio::select! {
            biased;
            _ = join_all(&mut handles) => {
                // Finishing on the deadline tick is not finishing before it.
                if shutdown_ctx.err() == Some(ContextError::DeadlineExceeded) {
                    ShutdownOutcome::ForcedStop
                } else {
                    ShutdownOutcome::CleanlyStopped
                }
            }
            _ = shutdown_ctx.cancelled() => ShutdownOutcome::ForcedStop,
        };

        match outcome {
            ShutdownOutcome::CleanlyStopped => {
                release.cancel();
                info!("All routines shut down");
            }
            ShutdownOutcome::ForcedStop => {
                let outstanding: Vec<&str> = handles
                    .iter()
                    .filter(|(_, handle)| !handle.is_finished())
                    .map(|(routine, _)| routine.name())
                    .collect();
                error!(
                    ?outstanding,
                    "Graceful shutdown period exceeded, forcefully shutting down"
                );
            }
        }

        outcome
    }
}

impl Default for RoutineManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl fmt::Debug for RoutineManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutineManager")
            .field("graceful_shutdown_period", &self.graceful_shutdown_period)
            .field("routines", &self.routine_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Start tasks are detached: start usually outlives the manager's interest in it.
/// A watcher task still reports a panicking start against the routine's name.
fn spawn_start(routine: Arc<dyn Routine>, ctx: Context) {
    let watched = routine.clone();
    let handle = tokio::spawn(
        async move {
            let name = routine.name();
            debug!(routine = name, "Starting routine");

            match routine.start(ctx).await {
                Ok(()) => debug!(routine = name, "Routine start returned"),
                Err(e) if e.is_cancellation() || routine.is_ignored_start_error(&e) => {
                    debug!(routine = name, error = %e, "Routine stopped")
                }
                Err(e) => error!(routine = name, error = %e, "Error starting routine"),
            }
        }
        .in_current_span(),
    );

    tokio::spawn(
        async move {
            if let Err(e) = handle.await {
                error!(routine = watched.name(), error = %e, "Start task failed");
            }
        }
        .in_current_span(),
    );
}

fn spawn_shutdown(routine: Arc<dyn Routine>, ctx: Context) -> JoinHandle<()> {
    let task = async move {
        let name = routine.name();
        let result = routine.shutdown(ctx.clone()).await;

        match &result {
            Ok(()) => debug!(routine = name, "Routine shut down"),
            Err(e) if e.is_cancellation() => debug!(routine = name, error = %e, "Routine shut down"),
            Err(e) => error!(routine = name, error = %e, "Error shutting down routine"),
        }

        if ctx.err() == Some(ContextError::DeadlineExceeded) {
            warn!(routine = name, "Graceful period exceeded");
        }
    };
    tokio::spawn(task.in_current_span())
}

/// Awaits every handle. The tasks already run concurrently, so awaiting them in order
/// only determines when we notice completion, not when they complete.
async fn join_all(handles: &mut [(Arc<dyn Routine>, JoinHandle<()>)]) {
    for (routine, handle) in handles.iter_mut() {
        if let Err(e) = handle.await {
            error!(routine = routine.name(), error = %e, "Shutdown task failed");
        }
    }
}
