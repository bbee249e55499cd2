//! # Routine Errors
//!
//! This module defines the error types shared by the manager, the routines it drives
//! and the ambient setup code (configuration, tracing). Centralizing them keeps the
//! "is this a cancellation?" decision in one place.

/// Why a [`Context`](crate::Context) stopped being live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Error returned by [`Routine::start`](crate::Routine::start) and
/// [`Routine::shutdown`](crate::Routine::shutdown).
///
/// The manager never propagates these. They only decide what gets logged and at which
/// level: [`RoutineError::is_cancellation`] errors are treated as benign.
#[derive(Debug, thiserror::Error)]
pub enum RoutineError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{0}")]
    Failed(String),
    #[error("Routine error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl RoutineError {
    /// Wraps any error type coming out of the underlying service.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        RoutineError::Other(err.into())
    }

    /// True when the routine stopped because its context was cancelled.
    ///
    /// A deadline expiry is *not* a cancellation; it is reported like any other failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RoutineError::Context(ContextError::Canceled))
    }
}

/// Errors raised while building a [`ManagerConfig`](crate::ManagerConfig).
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors raised while installing the global tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to install tracing subscriber: {0}")]
    Init(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_cancel_counts_as_cancellation() {
        assert!(RoutineError::from(ContextError::Canceled).is_cancellation());
        assert!(!RoutineError::from(ContextError::DeadlineExceeded).is_cancellation());
        assert!(!RoutineError::Failed("boom".into()).is_cancellation());
    }

    #[test]
    fn other_keeps_the_source_message() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err = RoutineError::other(io);
        assert_eq!(err.to_string(), "Routine error: port taken");
    }
}
