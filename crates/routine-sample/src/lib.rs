//! # Routine Manager Sample
//!
//! Two routines wired into a [`RoutineManager`](routine_manager::RoutineManager) by
//! `main`:
//!
//! - [`ticker::Ticker`]: logs a heartbeat until the run context is cancelled.
//! - [`echo::EchoServer`]: a TCP echo server with a server-style start/shutdown pair.
//!
//! ```bash
//! RUST_LOG=debug ECHO_ADDR=127.0.0.1:7878 cargo run -p routine-sample
//! # Ctrl+C: exits 0 if both routines stopped within the graceful period, 1 otherwise.
//! ```

pub mod echo;
pub mod ticker;

pub use echo::{EchoServer, ServerClosed};
pub use ticker::Ticker;
