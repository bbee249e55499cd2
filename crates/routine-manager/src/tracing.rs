//! # Observability & Tracing
//!
//! The manager logs through the `tracing` facade. Every entry that concerns a single
//! routine carries a `routine` field, so a log collector can filter one service's
//! lifecycle out of the stream:
//!
//! ```text
//! INFO Starting routines routines=2
//! INFO Shutdown triggered, stopping routines graceful_period=10s
//! ERROR Error shutting down routine routine="http" error=listener already closed
//! WARN Graceful period exceeded routine="http"
//! ERROR Graceful shutdown period exceeded, forcefully shutting down outstanding=["http"]
//! ```
//!
//! ## Configuration
//!
//! [`LogOptions`] picks the minimum level and the output format:
//!
//! - [`LogFormat::Compact`] (default): single-line, logfmt-like output.
//! - [`LogFormat::Pretty`]: multi-line, human-friendly output for development.
//! - [`LogFormat::Json`]: one JSON object per line for log collectors.
//!
//! `RUST_LOG` overrides the configured level when set. At debug level and below,
//! source file and line are recorded as well.
//!
//! Setting [`LogOptions::component`] tags every line logged under
//! [`LogOptions::component_span`] with a `component` key. The manager's tasks inherit
//! the span they were spawned in, so instrumenting the `run` future is enough:
//!
//! ```rust,no_run
//! use routine_manager::{Context, LogOptions, RoutineManager};
//! use tracing::Instrument;
//!
//! # async fn run(manager: RoutineManager, ctx: Context) {
//! let opts = LogOptions { component: Some("billing"), ..LogOptions::default() };
//! manager.run(ctx).instrument(opts.component_span()).await;
//! # }
//! ```
//!
//! ```bash
//! RUST_LOG=debug cargo run -p routine-sample
//! ```

use crate::error::{ConfigError, TracingError};
use std::str::FromStr;
use tracing::{Level, Span};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "logfmt" => Ok(LogFormat::Compact),
            "pretty" | "human" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                key: "log_format",
                value: s.to_string(),
                reason: "expected one of compact, pretty, json".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub level: Level,
    pub format: LogFormat,
    /// Added as a `component` key to everything logged under [`Self::component_span`].
    pub component: Option<&'static str>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            component: None,
        }
    }
}

impl LogOptions {
    /// Root span carrying the configured component, or a disabled span without one.
    pub fn component_span(&self) -> Span {
        match self.component {
            Some(component) => tracing::info_span!("component", component),
            None => Span::none(),
        }
    }
}

/// Installs the default compact subscriber, ignoring an already installed one.
pub fn setup_tracing() {
    let _ = try_setup_tracing(&LogOptions::default());
}

/// Installs the global subscriber described by `opts`.
///
/// Fails if a global subscriber is already set.
pub fn try_setup_tracing(opts: &LogOptions) -> Result<(), TracingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(opts.level).into())
        .from_env_lossy();
    let with_source = opts.level >= Level::DEBUG;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(with_source)
        .with_line_number(with_source);

    let result = match opts.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(TracingError::Init)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_aliases() {
        assert_eq!("logfmt".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("Human".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" json ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn component_span_is_disabled_without_a_component() {
        assert!(LogOptions::default().component_span().is_none());
    }

    #[test]
    fn second_install_is_rejected() {
        setup_tracing();
        assert!(try_setup_tracing(&LogOptions::default()).is_err());
    }
}
