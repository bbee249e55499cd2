//! # Routine Manager
//!
//! This crate starts and stops a fixed set of independent, long-running background
//! services ("routines") as part of a larger process. It launches them concurrently,
//! waits for a process-wide shutdown trigger, and then gives every routine a bounded
//! amount of time to stop before reporting a forced termination.
//!
//! ## Architecture Overview
//!
//! 1. **Capability** ([`Routine`]): what every managed service implements.
//! 2. **Signal** ([`Context`], [`notify_shutdown`]): the cancellable run context.
//! 3. **Orchestration** ([`RoutineManager`]): registry, concurrent start, concurrent
//!    deadline-bounded shutdown.
//! 4. **Decision** ([`ShutdownOutcome`]): returned to the caller, who owns the process exit.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use routine_manager::{notify_shutdown, setup_tracing, ManagerConfig, RoutineManager};
//! use std::process::ExitCode;
//!
//! #[tokio::main]
//! async fn main() -> ExitCode {
//!     setup_tracing();
//!
//!     let config = ManagerConfig::from_env().unwrap_or_default();
//!     let mut manager = RoutineManager::new(config);
//!     // manager.register(HttpServer::new(...));
//!
//!     let (ctx, _cancel) = notify_shutdown();
//!     manager.run(ctx).await.into()
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - One Tokio task per routine per phase; no ordering between routines.
//! - All `start` calls are issued before the manager waits for cancellation, and all
//!   `shutdown` calls only after it.
//! - The graceful deadline never cancels a routine's `shutdown`: the manager just stops
//!   waiting for it.
//!
//! ## Testing
//!
//! The [`mock`] module provides scripted routines and a log capture layer.

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod mock;
pub mod outcome;
pub mod routine;
pub mod signal;
pub mod tracing;

pub use crate::tracing::{setup_tracing, try_setup_tracing, LogFormat, LogOptions};
pub use config::{ManagerConfig, DEFAULT_GRACEFUL_SHUTDOWN_PERIOD, GRACEFUL_SHUTDOWN_PERIOD_ENV};
pub use context::{CancelHandle, Context};
pub use error::{ConfigError, ContextError, RoutineError, TracingError};
pub use manager::RoutineManager;
pub use outcome::ShutdownOutcome;
pub use routine::Routine;
pub use signal::notify_shutdown;
