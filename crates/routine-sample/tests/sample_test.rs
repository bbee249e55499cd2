use routine_manager::mock::LogCapture;
use routine_manager::{Context, ManagerConfig, Routine, RoutineManager, ShutdownOutcome};
use routine_sample::{EchoServer, Ticker};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::Level;

#[tokio::test]
async fn echo_server_echoes_and_shuts_down_cleanly() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let echo = EchoServer::bind("127.0.0.1:0").await.unwrap();
    let addr = echo.local_addr();

    let mut manager =
        RoutineManager::new(ManagerConfig::with_graceful_shutdown_period(Duration::from_secs(2)));
    manager.register(echo);

    let (ctx, cancel) = Context::with_cancel();
    let run = tokio::spawn(manager.run(ctx));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    cancel.cancel();
    assert_eq!(run.await.unwrap(), ShutdownOutcome::CleanlyStopped);

    // "server closed" is the expected way for start to return.
    assert!(logs.at_level(Level::ERROR).is_empty(), "{:?}", logs.records());
}

#[tokio::test]
async fn echo_shutdown_before_start_is_clean() {
    let echo = EchoServer::bind("127.0.0.1:0").await.unwrap();
    let (ctx, _cancel) = Context::with_timeout(Duration::from_secs(1));

    echo.shutdown(ctx.clone()).await.unwrap();

    let err = echo.start(ctx).await.unwrap_err();
    assert!(echo.is_ignored_start_error(&err));
}

#[tokio::test(start_paused = true)]
async fn ticker_ticks_until_cancelled() {
    let ticker = Arc::new(Ticker::new(Duration::from_secs(1)));
    let mut manager = RoutineManager::default();
    manager.register_shared(ticker.clone());

    let (ctx, cancel) = Context::with_cancel();
    let run = tokio::spawn(manager.run(ctx));

    tokio::time::sleep(Duration::from_millis(3500)).await;
    cancel.cancel();

    assert_eq!(run.await.unwrap(), ShutdownOutcome::CleanlyStopped);
    assert_eq!(ticker.ticks(), 3);
}
