//! # Manager Configuration
//!
//! The only tunable is the graceful-shutdown period: how long the manager waits, from
//! the moment shutdown begins, for every routine's `shutdown` to return before it gives
//! up and reports [`ShutdownOutcome::ForcedStop`](crate::ShutdownOutcome::ForcedStop).
//!
//! A zero period means "unset" and falls back to [`DEFAULT_GRACEFUL_SHUTDOWN_PERIOD`].
//! Any non-zero value supplied by the caller wins.
//!
//! The config can be built in code, read from the environment with
//! [`ManagerConfig::from_env`], or deserialized as part of a larger config file:
//!
//! ```toml
//! graceful_shutdown_period_ms = 15000
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub const DEFAULT_GRACEFUL_SHUTDOWN_PERIOD: Duration = Duration::from_secs(10);

/// Environment variable read by [`ManagerConfig::from_env`].
pub const GRACEFUL_SHUTDOWN_PERIOD_ENV: &str = "ROUTINE_GRACEFUL_SHUTDOWN_PERIOD_MS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum time allowed for all shutdown calls. Zero means "use the default".
    #[serde(
        rename = "graceful_shutdown_period_ms",
        deserialize_with = "duration_from_millis"
    )]
    pub graceful_shutdown_period: Duration,
}

impl ManagerConfig {
    pub fn with_graceful_shutdown_period(period: Duration) -> Self {
        Self {
            graceful_shutdown_period: period,
        }
    }

    /// Reads [`GRACEFUL_SHUTDOWN_PERIOD_ENV`]. A missing variable leaves the period unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let Some(raw) = lookup(GRACEFUL_SHUTDOWN_PERIOD_ENV) else {
            return Ok(Self::default());
        };
        let millis = raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                key: GRACEFUL_SHUTDOWN_PERIOD_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_graceful_shutdown_period(Duration::from_millis(
            millis,
        )))
    }

    /// The caller's period if non-zero, otherwise [`DEFAULT_GRACEFUL_SHUTDOWN_PERIOD`].
    pub fn effective_graceful_shutdown_period(&self) -> Duration {
        if self.graceful_shutdown_period.is_zero() {
            DEFAULT_GRACEFUL_SHUTDOWN_PERIOD
        } else {
            self.graceful_shutdown_period
        }
    }
}

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_falls_back_to_default() {
        let config = ManagerConfig::default();
        assert_eq!(
            config.effective_graceful_shutdown_period(),
            DEFAULT_GRACEFUL_SHUTDOWN_PERIOD
        );
    }

    #[test]
    fn non_zero_period_overrides_default() {
        let config = ManagerConfig::with_graceful_shutdown_period(Duration::from_secs(15));
        assert_eq!(
            config.effective_graceful_shutdown_period(),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn lookup_parses_milliseconds() {
        let config = ManagerConfig::from_lookup(|_| Some(" 250 ".to_string())).unwrap();
        assert_eq!(config.graceful_shutdown_period, Duration::from_millis(250));
    }

    #[test]
    fn missing_variable_leaves_period_unset() {
        let config = ManagerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn garbage_value_is_rejected() {
        let err = ManagerConfig::from_lookup(|_| Some("ten seconds".to_string())).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: GRACEFUL_SHUTDOWN_PERIOD_ENV, .. }
        ));
    }

    #[test]
    fn deserializes_from_toml() {
        let config: ManagerConfig = toml::from_str("graceful_shutdown_period_ms = 15000").unwrap();
        assert_eq!(config.graceful_shutdown_period, Duration::from_secs(15));

        let empty: ManagerConfig = toml::from_str("").unwrap();
        assert!(empty.graceful_shutdown_period.is_zero());
    }
}
