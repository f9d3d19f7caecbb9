//! Termination requests delivered as real process signals.
//!
//! Kept in their own test binary: the handler and the hook slot are
//! process-wide.

#![cfg(unix)]

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use styx_daemon::signal::UNHANDLED_TERMINATION_EXIT_CODE;
use styx_daemon::{Daemon, Exit};

const CHILD_ENV: &str = "STYX_SIGNAL_TEST_CHILD";

fn send_sigterm_to_self() {
    let status = Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn test_sigterm_drains_entry_point() {
    let drained = Arc::new(AtomicBool::new(false));
    let drained_flag = Arc::clone(&drained);
    let start = Instant::now();

    let exit = Daemon::main_with_signal(move |stop| {
        // The hook is installed before the entry point starts
        thread::spawn(send_sigterm_to_self);
        assert!(stop.wait_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(200));
        drained_flag.store(true, Ordering::Release);
    })
    .unwrap();

    assert_eq!(exit, Exit::Terminated);
    assert!(drained.load(Ordering::Acquire));
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[test]
fn test_sigterm_without_daemon_exits() {
    let output = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "sigterm_after_daemon_child", "--ignored", "--nocapture"])
        .env(CHILD_ENV, "1")
        .output()
        .unwrap();

    assert_eq!(
        output.status.code(),
        Some(UNHANDLED_TERMINATION_EXIT_CODE),
        "child survived SIGTERM: {}",
        String::from_utf8_lossy(&output.stdout)
    );
}

/// Runs in a child process of `test_sigterm_without_daemon_exits`.
#[test]
#[ignore = "spawned by test_sigterm_without_daemon_exits"]
fn sigterm_after_daemon_child() {
    if std::env::var_os(CHILD_ENV).is_none() {
        return;
    }

    let exit = Daemon::main(|| (), || ()).unwrap();
    assert_eq!(exit, Exit::Completed);

    send_sigterm_to_self();
    thread::sleep(Duration::from_secs(5));
    println!("process survived SIGTERM with no daemon running");
}
