//! A routine that logs a heartbeat on a fixed interval until cancelled.

use async_trait::async_trait;
use routine_manager::{Context, ContextError, Routine, RoutineError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

pub struct Ticker {
    interval: Duration,
    ticks: AtomicU64,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Routine for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    async fn start(&self, ctx: Context) -> Result<(), RoutineError> {
        let mut interval = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(routine = self.name(), tick, "Heartbeat");
                }
                _ = ctx.cancelled() => {
                    return Err(ctx.err().unwrap_or(ContextError::Canceled).into());
                }
            }
        }
    }

    async fn shutdown(&self, _ctx: Context) -> Result<(), RoutineError> {
        info!(routine = self.name(), ticks = self.ticks(), "Ticker stopped");
        Ok(())
    }
}
