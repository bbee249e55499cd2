//! OS signal handling.
//!
//! [`notify_shutdown`] produces the run context for [`RoutineManager::run`](crate::RoutineManager::run):
//! it is cancelled on Ctrl+C (SIGINT) and, on Unix, SIGTERM.

use crate::context::{CancelHandle, Context};
use tracing::{info, warn};

/// Returns a context cancelled on the first interrupt/terminate request.
///
/// The handle cancels the context explicitly, e.g. to trigger shutdown programmatically
/// or to release the signal listener once the caller is done. Must be called from
/// within a Tokio runtime.
pub fn notify_shutdown() -> (Context, CancelHandle) {
    let (ctx, cancel) = Context::with_cancel();

    let listener_ctx = ctx.clone();
    let listener_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_signal() => {
                info!(signal, "Received shutdown signal");
                listener_cancel.cancel();
            }
            _ = listener_ctx.cancelled() => {}
        }
    });

    (ctx, cancel)
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term_signal = match signal(SignalKind::terminate()) {
        Ok(sig) => Some(sig),
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, only Ctrl+C will trigger shutdown");
            None
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            "SIGINT"
        }
        _ = async {
            match term_signal.as_mut() {
                Some(sig) => {
                    sig.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        } => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;

    #[tokio::test]
    async fn handle_cancels_without_a_signal() {
        let (ctx, cancel) = notify_shutdown();
        assert!(!ctx.is_cancelled());

        cancel.cancel();
        ctx.cancelled().await;

        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }
}
