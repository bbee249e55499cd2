//! # Routine Manager Sample
//!
//! Runs a ticker and a TCP echo server until Ctrl+C / SIGTERM, then shuts both down
//! within the graceful period and exits with the resulting status.
//!
//! ## Environment
//!
//! - `RUST_LOG`: log filter (default `info`).
//! - `LOG_FORMAT`: `compact` (default), `pretty` or `json`.
//! - `ECHO_ADDR`: echo server bind address (default `127.0.0.1:7878`).
//! - `ROUTINE_GRACEFUL_SHUTDOWN_PERIOD_MS`: graceful period (default 10s).

use routine_manager::{
    notify_shutdown, try_setup_tracing, LogFormat, LogOptions, ManagerConfig, RoutineManager,
};
use routine_sample::{EchoServer, Ticker};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, Instrument};

const DEFAULT_ECHO_ADDR: &str = "127.0.0.1:7878";

#[tokio::main]
async fn main() -> ExitCode {
    let format = match std::env::var("LOG_FORMAT") {
        Ok(raw) => match raw.parse::<LogFormat>() {
            Ok(format) => format,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        Err(_) => LogFormat::default(),
    };
    let log_options = LogOptions {
        format,
        component: Some("routine-sample"),
        ..LogOptions::default()
    };
    if let Err(e) = try_setup_tracing(&log_options) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let config = match ManagerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let echo_addr = std::env::var("ECHO_ADDR").unwrap_or_else(|_| DEFAULT_ECHO_ADDR.to_string());
    let echo = match EchoServer::bind(echo_addr.as_str()).await {
        Ok(echo) => echo,
        Err(e) => {
            error!(addr = %echo_addr, error = %e, "Failed to bind echo server");
            return ExitCode::FAILURE;
        }
    };

    let mut manager = RoutineManager::new(config);
    manager.register(Ticker::new(Duration::from_secs(5)));
    manager.register(echo);
    info!(
        routines = ?manager.routine_names().collect::<Vec<_>>(),
        graceful_period = ?manager.graceful_shutdown_period(),
        "Starting application"
    );

    let (ctx, _cancel) = notify_shutdown();
    let outcome = manager.run(ctx).instrument(log_options.component_span()).await;

    info!(?outcome, "Application stopped");
    outcome.into()
}
