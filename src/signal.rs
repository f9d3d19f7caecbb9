//! Process termination hook.
//!
//! A single `ctrlc` handler is installed per process the first time a daemon
//! registers itself. With ctrlc's `termination` feature it fires on SIGINT,
//! SIGTERM and SIGHUP on Unix and on console events on Windows. The handler
//! runs on a dedicated thread and forwards every request to the
//! [`TerminationHandle`] currently installed in a process-wide slot, blocking
//! for as long as that handle's termination handshake takes.
//!
//! Once registered, the handler stays in place for the life of the process.
//! A request that arrives while no daemon is running ends the process with
//! [`UNHANDLED_TERMINATION_EXIT_CODE`], as the default disposition would.

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::daemon::TerminationHandle;
use crate::error::Result;

/// Exit code used when a termination request arrives with no daemon running.
pub const UNHANDLED_TERMINATION_EXIT_CODE: i32 = 1;

static HOOK: ArcSwapOption<TerminationHandle> = ArcSwapOption::const_empty();
static REGISTERED: Mutex<bool> = Mutex::new(false);

/// Install `handle` as the process termination hook.
///
/// Replaces any previously installed hook. The underlying signal handler is
/// registered on the first call only.
///
/// # Errors
///
/// Returns an `Error::Signal` if the platform handler cannot be registered,
/// for example because another `ctrlc` handler already exists in this
/// process. The slot is left empty in that case.
pub fn install(handle: TerminationHandle) -> Result<()> {
    let mut registered = REGISTERED.lock();
    HOOK.store(Some(Arc::new(handle)));
    if !*registered {
        if let Err(e) = ctrlc::set_handler(on_termination) {
            HOOK.store(None);
            return Err(e.into());
        }
        *registered = true;
        info!("Termination hook registered (SIGINT, SIGTERM, SIGHUP)");
    }
    Ok(())
}

/// Remove `handle` from the slot if it is still the installed hook.
pub(crate) fn uninstall_handle(handle: &TerminationHandle) {
    let current = HOOK.load();
    if current.as_ref().is_some_and(|h| h.is_same(handle)) {
        let _ = HOOK.compare_and_swap(&current, None);
    }
}

/// Remove the installed hook, if any.
///
/// Until another hook is installed, a termination request ends the process
/// if the platform handler has been registered.
pub fn uninstall() {
    HOOK.store(None);
}

/// Whether a hook is currently installed.
#[must_use]
pub fn is_installed() -> bool {
    HOOK.load().is_some()
}

fn on_termination() {
    if !dispatch() {
        warn!(
            code = UNHANDLED_TERMINATION_EXIT_CODE,
            "Termination requested but no daemon is running, exiting"
        );
        std::process::exit(UNHANDLED_TERMINATION_EXIT_CODE);
    }
}

/// Deliver a termination request to the installed hook.
///
/// Returns `false` if the slot is empty.
fn dispatch() -> bool {
    match HOOK.load_full() {
        Some(handle) => {
            info!(daemon = %handle.name(), "Termination requested");
            handle.terminate();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::Daemon;
    use crate::shutdown::{Exit, StopSignal};
    use std::thread;

    // One test: the slot is process-wide.
    #[test]
    fn test_dispatch_to_installed_hook() {
        uninstall();
        assert!(!is_installed());
        assert!(!dispatch());

        let signal = StopSignal::new();
        let trigger = signal.clone();
        let daemon = Daemon::builder()
            .name("dispatch-test")
            .on_stop(move || trigger.trigger())
            .without_signals()
            .build()
            .unwrap();
        let handle = daemon.termination_handle();
        HOOK.store(Some(Arc::new(handle.clone())));
        assert!(is_installed());

        let hook = thread::spawn(dispatch);
        let exit = daemon.run(move || signal.wait()).unwrap();
        assert!(hook.join().unwrap());
        assert_eq!(exit, Exit::Terminated);

        // Only the matching handle clears the slot
        let other = Daemon::builder()
            .on_stop(|| ())
            .without_signals()
            .build()
            .unwrap()
            .termination_handle();
        uninstall_handle(&other);
        assert!(is_installed());
        uninstall_handle(&handle);
        assert!(!is_installed());
        assert!(!dispatch());
    }
}
