//! # Mock Routines & Log Capture
//!
//! Testing a lifecycle manager means provoking the misbehaviour it has to survive:
//! routines that hang, fail, or return only after the deadline. [`MockRoutine`] scripts
//! that behaviour, and [`CallCounter`] records what the manager actually called after
//! the routine has been moved into it.
//!
//! [`LogCapture`] is a `tracing_subscriber` layer that records every event, so tests can
//! assert on *how* something was reported (e.g. "a cancellation is never logged at
//! error level").
//!
//! ## When to use what
//!
//! | Want to check | Use |
//! |---------------|-----|
//! | how many `start`/`shutdown` calls happened | [`CallCounter`] |
//! | which outcome a timing scenario produces | [`ShutdownBehavior::Delay`] / [`ShutdownBehavior::Hang`] with `start_paused = true` |
//! | what got logged, and at which level | [`LogCapture::install`] |
//! | how a routine honouring the deadline is reported | [`ShutdownBehavior::UntilDeadline`] |
//! | fields and enclosing spans of a log line | [`CapturedLog::field`], [`CapturedLog::spans`] |
//!
//! ## Example
//!
//! ```rust
//! use routine_manager::mock::{LogCapture, MockRoutine, ShutdownBehavior, StartBehavior};
//! use routine_manager::{Context, RoutineManager, ShutdownOutcome};
//! use std::time::Duration;
//! use tracing::Level;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let logs = LogCapture::new();
//!     let _guard = logs.install();
//!
//!     let routine = MockRoutine::new("db")
//!         .start_with(StartBehavior::Fail("connection refused".into()))
//!         .shutdown_with(ShutdownBehavior::Delay(Duration::from_millis(5)));
//!     let calls = routine.calls();
//!
//!     let mut manager = RoutineManager::default();
//!     manager.register(routine);
//!
//!     let (ctx, cancel) = Context::with_cancel();
//!     cancel.cancel();
//!     assert_eq!(manager.run(ctx).await, ShutdownOutcome::CleanlyStopped);
//!
//!     assert_eq!(calls.shutdown_calls(), 1);
//!     assert_eq!(logs.at_level(Level::ERROR).len(), 1);
//! }
//! ```

use crate::context::Context;
use crate::error::RoutineError;
use crate::routine::Routine;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

// =============================================================================
// SCRIPTED ROUTINE
// =============================================================================

/// What [`MockRoutine::start`](Routine::start) does.
#[derive(Debug, Clone, PartialEq)]
pub enum StartBehavior {
    /// Block until the run context is cancelled, then return the context error.
    UntilCancelled,
    /// Return `Ok(())` immediately.
    Return,
    /// Return `RoutineError::Failed` immediately.
    Fail(String),
}

/// What [`MockRoutine::shutdown`](Routine::shutdown) does.
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownBehavior {
    /// Return `Ok(())` immediately.
    Return,
    /// Sleep, ignoring the context, then return `Ok(())`.
    Delay(Duration),
    /// Never return.
    Hang,
    /// Return `RoutineError::Failed` immediately.
    Fail(String),
    /// Return a cancellation error immediately.
    Cancelled,
    /// Wait for the shutdown context to end, then return its error.
    UntilDeadline,
}

/// Call counters shared between a [`MockRoutine`] and the test that built it.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    start_calls: Arc<AtomicUsize>,
    start_returns: Arc<AtomicUsize>,
    shutdown_calls: Arc<AtomicUsize>,
    shutdown_returns: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn start_returns(&self) -> usize {
        self.start_returns.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_returns(&self) -> usize {
        self.shutdown_returns.load(Ordering::SeqCst)
    }
}

/// A [`Routine`] whose behaviour is scripted by the test.
///
/// Defaults to a well-behaved routine: `start` blocks until cancelled, `shutdown`
/// returns immediately.
#[derive(Debug)]
pub struct MockRoutine {
    name: String,
    start: StartBehavior,
    shutdown: ShutdownBehavior,
    ignored_start_error: Option<String>,
    calls: CallCounter,
}

impl MockRoutine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: StartBehavior::UntilCancelled,
            shutdown: ShutdownBehavior::Return,
            ignored_start_error: None,
            calls: CallCounter::default(),
        }
    }

    pub fn start_with(mut self, behavior: StartBehavior) -> Self {
        self.start = behavior;
        self
    }

    pub fn shutdown_with(mut self, behavior: ShutdownBehavior) -> Self {
        self.shutdown = behavior;
        self
    }

    /// Declares a `Failed(message)` start error as an expected consequence of shutdown.
    pub fn ignoring_start_error(mut self, message: impl Into<String>) -> Self {
        self.ignored_start_error = Some(message.into());
        self
    }

    /// Counters that stay readable after the routine moved into a manager.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl Routine for MockRoutine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: Context) -> Result<(), RoutineError> {
        self.calls.start_calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.start {
            StartBehavior::UntilCancelled => {
                ctx.cancelled().await;
                ctx.check().map_err(RoutineError::from)
            }
            StartBehavior::Return => Ok(()),
            StartBehavior::Fail(message) => Err(RoutineError::Failed(message.clone())),
        };
        self.calls.start_returns.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn shutdown(&self, ctx: Context) -> Result<(), RoutineError> {
        self.calls.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.shutdown {
            ShutdownBehavior::Return => Ok(()),
            ShutdownBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            ShutdownBehavior::Hang => std::future::pending().await,
            ShutdownBehavior::Fail(message) => Err(RoutineError::Failed(message.clone())),
            ShutdownBehavior::Cancelled => Err(crate::error::ContextError::Canceled.into()),
            ShutdownBehavior::UntilDeadline => {
                ctx.cancelled().await;
                ctx.check().map_err(RoutineError::from)
            }
        };
        self.calls.shutdown_returns.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn is_ignored_start_error(&self, err: &RoutineError) -> bool {
        match (&self.ignored_start_error, err) {
            (Some(ignored), RoutineError::Failed(message)) => ignored == message,
            _ => false,
        }
    }
}

// =============================================================================
// LOG CAPTURE
// =============================================================================

/// One recorded `tracing` event.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedLog {
    pub level: Level,
    pub message: String,
    pub routine: Option<String>,
    pub error: Option<String>,
    /// Every other field, including those of enclosing spans. Event fields win.
    pub fields: BTreeMap<String, String>,
    /// Names of the enclosing spans, innermost first.
    pub spans: Vec<String>,
}

impl CapturedLog {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A layer that records every event it sees.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes this capture the current thread's default subscriber until the guard drops.
    ///
    /// Use with a current-thread runtime (the `#[tokio::test]` default) so spawned tasks
    /// log on the same thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing_subscriber::registry()
            .with(self.clone())
            .set_default()
    }

    pub fn records(&self) -> Vec<CapturedLog> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedLog> {
        self.records()
            .into_iter()
            .filter(|log| log.level == level)
            .collect()
    }

    /// Records attributed to `routine` through the `routine` field.
    pub fn for_routine(&self, routine: &str) -> Vec<CapturedLog> {
        self.records()
            .into_iter()
            .filter(|log| log.routine.as_deref() == Some(routine))
            .collect()
    }
}

/// Fields recorded when a span is created, kept in the span's extensions.
struct SpanFields(BTreeMap<String, String>);

impl<S> Layer<S> for LogCapture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: LayerContext<'_, S>) {
        let mut visitor = CaptureVisitor::default();
        attrs.record(&mut visitor);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(visitor.fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let mut visitor = CaptureVisitor::default();
        event.record(&mut visitor);

        let mut spans = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                spans.push(span.name().to_string());
                if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                    for (key, value) in fields {
                        visitor
                            .fields
                            .entry(key.clone())
                            .or_insert_with(|| value.clone());
                    }
                }
            }
        }

        let log = CapturedLog {
            level: *event.metadata().level(),
            message: visitor.message,
            routine: visitor.routine,
            error: visitor.error,
            fields: visitor.fields,
            spans,
        };
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(log);
    }
}

#[derive(Default)]
struct CaptureVisitor {
    message: String,
    routine: Option<String>,
    error: Option<String>,
    fields: BTreeMap<String, String>,
}

impl CaptureVisitor {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "routine" => self.routine = Some(value),
            "error" => self.error = Some(value),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for CaptureVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.store(field, format!("{value:?}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{error, info, info_span, warn};

    #[tokio::test]
    async fn default_routine_stops_on_cancel() {
        let routine = MockRoutine::new("ticker");
        let calls = routine.calls();
        let (ctx, cancel) = Context::with_cancel();

        cancel.cancel();
        let err = routine.start(ctx.clone()).await.unwrap_err();
        assert!(err.is_cancellation());

        routine.shutdown(ctx).await.unwrap();
        assert_eq!(calls.start_calls(), 1);
        assert_eq!(calls.start_returns(), 1);
        assert_eq!(calls.shutdown_calls(), 1);
        assert_eq!(calls.shutdown_returns(), 1);
    }

    #[test]
    fn ignored_start_error_matches_message() {
        let routine = MockRoutine::new("http").ignoring_start_error("server closed");
        assert!(routine.is_ignored_start_error(&RoutineError::Failed("server closed".into())));
        assert!(!routine.is_ignored_start_error(&RoutineError::Failed("bind failed".into())));
    }

    #[test]
    fn capture_records_level_and_fields() {
        let logs = LogCapture::new();
        {
            let _guard = logs.install();
            info!(routine = "http", "Registered routine");
            error!(routine = "db", error = %"refused", "Error starting routine");
        }
        info!("not captured");

        let records = logs.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, Level::INFO);
        assert_eq!(records[0].routine.as_deref(), Some("http"));
        assert_eq!(records[1].message, "Error starting routine");
        assert_eq!(records[1].error.as_deref(), Some("refused"));
        assert_eq!(logs.for_routine("db").len(), 1);
    }

    #[test]
    fn capture_records_enclosing_span_fields() {
        let logs = LogCapture::new();
        let _guard = logs.install();

        let span = info_span!("component", component = "billing", attempt = 1);
        span.in_scope(|| warn!(attempt = 2, outstanding = ?["db"], "Retrying"));

        let record = &logs.records()[0];
        assert_eq!(record.spans, ["component"]);
        assert_eq!(record.field("component"), Some("billing"));
        assert_eq!(record.field("attempt"), Some("2"));
        assert_eq!(record.field("outstanding"), Some("[\"db\"]"));
    }

    #[tokio::test(start_paused = true)]
    async fn until_deadline_returns_the_context_error() {
        let routine = MockRoutine::new("stuck").shutdown_with(ShutdownBehavior::UntilDeadline);
        let (ctx, _cancel) = Context::with_timeout(Duration::from_millis(10));

        let err = routine.shutdown(ctx).await.unwrap_err();
        assert!(!err.is_cancellation());
        assert_eq!(err.to_string(), "context deadline exceeded");
    }
}
