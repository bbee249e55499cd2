//! # TCP Echo Server Routine
//!
//! Wraps a small TCP echo server in the [`Routine`] contract the same way an HTTP
//! server would be wrapped:
//!
//! - `start` runs the accept loop and only returns once the server is closed, with a
//!   [`ServerClosed`] error that the routine declares as expected.
//! - `shutdown` closes the listener, tells open connections to stop, and waits for the
//!   accept loop to exit, bounded by the shutdown context's deadline.

use async_trait::async_trait;
use routine_manager::{CancelHandle, Context, ContextError, Routine, RoutineError};
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

/// Returned by `start` after `shutdown` closed the server.
#[derive(Debug, thiserror::Error)]
#[error("server closed")]
pub struct ServerClosed;

pub struct EchoServer {
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    closing: Context,
    close: CancelHandle,
    stopped: Context,
    mark_stopped: CancelHandle,
}

impl EchoServer {
    /// Binds the listening socket. Accepting only begins once the routine is started.
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (closing, close) = Context::with_cancel();
        let (stopped, mark_stopped) = Context::with_cancel();
        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            closing,
            close,
            stopped,
            mark_stopped,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn take_listener(&self) -> Option<TcpListener> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    async fn accept_loop(&self, listener: TcpListener, ctx: &Context) -> RoutineError {
        let closing = &self.closing;
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(routine = self.name(), %peer, "Accepted connection");
                        tokio::spawn(echo(stream, closing.clone()));
                    }
                    Err(e) => warn!(routine = self.name(), error = %e, "Accept failed"),
                },
                _ = closing.cancelled() => return RoutineError::other(ServerClosed),
                _ = ctx.cancelled() => {
                    return ctx.err().unwrap_or(ContextError::Canceled).into();
                }
            }
        }
    }
}

#[async_trait]
impl Routine for EchoServer {
    fn name(&self) -> &str {
        "echo"
    }

    async fn start(&self, ctx: Context) -> Result<(), RoutineError> {
        // Shutdown ran first and took the listener.
        let Some(listener) = self.take_listener() else {
            return Err(RoutineError::other(ServerClosed));
        };
        info!(routine = self.name(), addr = %self.local_addr, "Listening");

        let err = self.accept_loop(listener, &ctx).await;
        self.mark_stopped.cancel();
        Err(err)
    }

    async fn shutdown(&self, ctx: Context) -> Result<(), RoutineError> {
        self.close.cancel();

        // Never started: nothing to wait for.
        if self.take_listener().is_some() {
            return Ok(());
        }

        tokio::select! {
            _ = self.stopped.cancelled() => Ok(()),
            _ = ctx.cancelled() => Err(ctx.err().unwrap_or(ContextError::Canceled).into()),
        }
    }

    fn is_ignored_start_error(&self, err: &RoutineError) -> bool {
        matches!(err, RoutineError::Other(source) if source.is::<ServerClosed>())
    }
}

async fn echo(mut stream: TcpStream, closing: Context) {
    let mut buf = [0u8; 1024];
    loop {
        let read = tokio::select! {
            read = stream.read(&mut buf) => read,
            _ = closing.cancelled() => return,
        };
        match read {
            Ok(0) => return,
            Ok(n) => {
                if let Err(e) = stream.write_all(&buf[..n]).await {
                    debug!(error = %e, "Echo write failed");
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "Echo read failed");
                return;
            }
        }
    }
}
