//! Shutdown handshake between the application thread and the termination hook.
//!
//! The `ShutdownCoordinator` owns the single "stopped" flag of a daemon
//! together with the phase of its shutdown. Both live behind one lock so
//! that setting the flag, notifying waiters and the waiter's check can never
//! interleave. Waiters block on a condition variable in a loop of bounded
//! waits, which tolerates missed notifications and spurious wake-ups.
//!
//! [`StopSignal`] is the cancellation primitive handed to entry points that
//! want a ready-made stop flag instead of wiring their own.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Interval at which blocked waiters re-check the stopped flag.
///
/// Only a liveness safeguard against missed wake-ups: there is no deadline,
/// waiters keep waiting until the entry point returns.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a daemon's entry point came to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The entry point returned before any termination request arrived.
    Completed,
    /// A termination request was received and the entry point was stopped.
    Terminated,
}

impl std::fmt::Display for Exit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "Completed"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Shutdown phase. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Entry point running, no termination request yet.
    Running,
    /// A termination request claimed the shutdown; the hook owns stop and done.
    Terminating,
    /// The entry point returned on its own; the caller owns done.
    Completing,
    /// Done has run, the handshake is over.
    Finished,
}

#[derive(Debug)]
struct State {
    stopped: bool,
    phase: Phase,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    changed: Condvar,
}

/// Coordinates the stopped flag and shutdown phase of one daemon.
#[derive(Debug, Clone)]
pub(crate) struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the running phase.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    stopped: false,
                    phase: Phase::Running,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Whether the entry point has returned.
    #[must_use]
    pub(crate) fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    /// Whether the handshake is complete.
    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.inner.state.lock().phase == Phase::Finished
    }

    #[cfg(test)]
    fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    /// Claim the shutdown for a termination request.
    ///
    /// Returns `true` if this call moved the coordinator from running to
    /// terminating. Returns `false` if the entry point already returned or
    /// another request got there first; the caller must then neither stop
    /// the application nor run the completion callback.
    pub(crate) fn begin_termination(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.phase == Phase::Running {
            state.phase = Phase::Terminating;
            true
        } else {
            debug!(phase = ?state.phase, stopped = state.stopped, "Termination already handled");
            false
        }
    }

    /// Record that the entry point returned and wake every waiter.
    ///
    /// Returns the phase observed at that moment: `Completing` if no
    /// termination request was in flight (the caller now owns the completion
    /// callback) or `Terminating` if the hook owns it.
    pub(crate) fn mark_stopped(&self) -> Phase {
        let mut state = self.inner.state.lock();
        state.stopped = true;
        if state.phase == Phase::Running {
            state.phase = Phase::Completing;
        }
        let phase = state.phase;
        drop(state);
        self.inner.changed.notify_all();
        phase
    }

    /// Mark the handshake as finished and wake every waiter.
    pub(crate) fn mark_finished(&self) {
        let mut state = self.inner.state.lock();
        state.phase = Phase::Finished;
        drop(state);
        self.inner.changed.notify_all();
    }

    /// Block until the entry point has returned.
    pub(crate) fn wait_stopped(&self) {
        let mut state = self.inner.state.lock();
        while !state.stopped {
            let _ = self.inner.changed.wait_for(&mut state, STOP_POLL_INTERVAL);
        }
    }

    /// Block until the handshake has finished.
    pub(crate) fn wait_finished(&self) {
        let mut state = self.inner.state.lock();
        while state.phase != Phase::Finished {
            let _ = self.inner.changed.wait_for(&mut state, STOP_POLL_INTERVAL);
        }
    }
}

#[derive(Debug)]
struct SignalInner {
    triggered: Mutex<bool>,
    changed: Condvar,
    #[cfg(feature = "tokio")]
    notify: tokio::sync::Notify,
}

/// One-shot stop flag handed to entry points.
///
/// Behaves like a count-down latch with a count of one: [`trigger`] opens it
/// for good, waiters return once it is open.
///
/// [`trigger`]: StopSignal::trigger
#[derive(Debug, Clone)]
pub struct StopSignal {
    inner: Arc<SignalInner>,
}

impl StopSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                triggered: Mutex::new(false),
                changed: Condvar::new(),
                #[cfg(feature = "tokio")]
                notify: tokio::sync::Notify::new(),
            }),
        }
    }

    /// Trigger the signal, releasing all current and future waiters.
    pub fn trigger(&self) {
        let mut triggered = self.inner.triggered.lock();
        *triggered = true;
        drop(triggered);
        self.inner.changed.notify_all();
        #[cfg(feature = "tokio")]
        self.inner.notify.notify_waiters();
    }

    /// Whether the signal has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.inner.triggered.lock()
    }

    /// Block the current thread until the signal is triggered.
    pub fn wait(&self) {
        let mut triggered = self.inner.triggered.lock();
        while !*triggered {
            self.inner.changed.wait(&mut triggered);
        }
    }

    /// Block for at most `timeout`. Returns `true` if the signal was triggered.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut triggered = self.inner.triggered.lock();
        while !*triggered {
            if self
                .inner
                .changed
                .wait_until(&mut triggered, deadline)
                .timed_out()
            {
                break;
            }
        }
        *triggered
    }

    /// Wait asynchronously until the signal is triggered.
    #[cfg(feature = "tokio")]
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_termination_claimed_once() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.begin_termination());
        assert!(!coordinator.begin_termination());
        assert_eq!(coordinator.phase(), Phase::Terminating);
    }

    #[test]
    fn test_stopped_before_termination_skips_it() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.mark_stopped(), Phase::Completing);
        assert!(coordinator.is_stopped());
        assert!(!coordinator.begin_termination());
    }

    #[test]
    fn test_stopped_after_termination_keeps_phase() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.begin_termination());
        assert_eq!(coordinator.mark_stopped(), Phase::Terminating);
        assert!(!coordinator.is_finished());
        coordinator.mark_finished();
        assert!(coordinator.is_finished());
    }

    #[test]
    fn test_wait_stopped_wakes_on_notify() {
        let coordinator = ShutdownCoordinator::new();
        let waiter = {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                let start = Instant::now();
                coordinator.wait_stopped();
                start.elapsed()
            })
        };

        thread::sleep(Duration::from_millis(50));
        coordinator.mark_stopped();
        let waited = waiter.join().unwrap();
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < STOP_POLL_INTERVAL);
    }

    #[test]
    fn test_wait_finished_returns_immediately_when_finished() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.mark_stopped();
        coordinator.mark_finished();
        coordinator.wait_finished();
        coordinator.wait_stopped();
    }

    #[test]
    fn test_stop_signal_wait() {
        let signal = StopSignal::new();
        assert!(!signal.is_triggered());
        assert!(!signal.wait_timeout(Duration::from_millis(10)));

        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };
        signal.trigger();
        waiter.join().unwrap();

        assert!(signal.is_triggered());
        assert!(signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_exit_display() {
        assert_eq!(Exit::Completed.to_string(), "Completed");
        assert_eq!(Exit::Terminated.to_string(), "Terminated");
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_stop_signal_cancelled() {
        let test_result = tokio::time::timeout(Duration::from_secs(5), async {
            let signal = StopSignal::new();
            let trigger = signal.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                trigger.trigger();
            });
            signal.cancelled().await;
            assert!(signal.is_triggered());

            // Already triggered: returns immediately
            signal.cancelled().await;
        })
        .await;

        assert!(test_result.is_ok(), "Test timed out after 5 seconds");
    }
}
