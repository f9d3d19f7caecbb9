//! Tests for driving a daemon from async code.

#![cfg(feature = "tokio")]

use std::time::Duration;
use styx_daemon::{Daemon, Exit, StopSignal};
use tokio::time::timeout;

#[tokio::test]
async fn test_stop_signal_wakes_async_waiters() {
    let test_result = timeout(Duration::from_secs(5), async {
        let signal = StopSignal::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.cancelled().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.trigger();
        for waiter in waiters {
            waiter.await.unwrap();
        }
    })
    .await;

    assert!(test_result.is_ok(), "Test timed out after 5 seconds");
}

#[test]
fn test_daemon_runs_async_entry_point() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let signal = StopSignal::new();
    let trigger = signal.clone();

    let daemon = Daemon::builder()
        .name("async-daemon")
        .on_stop(move || trigger.trigger())
        .without_signals()
        .build()
        .unwrap();
    let handle = daemon.termination_handle();

    runtime.spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::task::spawn_blocking(move || handle.terminate())
            .await
            .unwrap();
    });

    let exit = daemon
        .run(|| {
            runtime.block_on(async {
                let mut ticks = 0u32;
                loop {
                    tokio::select! {
                        () = signal.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_millis(5)) => ticks += 1,
                    }
                }
                tracing::info!(ticks, "Async entry point drained");
            });
        })
        .unwrap();

    assert_eq!(exit, Exit::Terminated);
}
