//! Terminal result of a [`RoutineManager::run`](crate::RoutineManager::run).

use std::process::ExitCode;

/// How the shutdown phase ended.
///
/// The manager never exits the process itself; the caller turns this into an exit
/// status (see the `From<ShutdownOutcome> for ExitCode` impl).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every routine's `shutdown` returned before the graceful period elapsed.
    CleanlyStopped,
    /// The graceful period elapsed with `shutdown` calls still outstanding.
    ForcedStop,
}

impl ShutdownOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, ShutdownOutcome::CleanlyStopped)
    }

    /// Process exit status: `0` when clean, `1` when forced.
    pub fn exit_code(&self) -> u8 {
        match self {
            ShutdownOutcome::CleanlyStopped => 0,
            ShutdownOutcome::ForcedStop => 1,
        }
    }
}

impl From<ShutdownOutcome> for ExitCode {
    fn from(outcome: ShutdownOutcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_stop_is_a_distinct_failure_status() {
        assert!(ShutdownOutcome::CleanlyStopped.is_clean());
        assert!(!ShutdownOutcome::ForcedStop.is_clean());
        assert_eq!(ShutdownOutcome::CleanlyStopped.exit_code(), 0);
        assert_eq!(ShutdownOutcome::ForcedStop.exit_code(), 1);
    }
}
