//! Daemon lifecycle: run an entry point, stop it cleanly on termination.
//!
//! [`Daemon`] runs the application's entry point on the calling thread and
//! registers a termination hook *before* the entry point starts. When the
//! host delivers a termination request, the hook invokes the stop callback
//! and then refuses to return until the entry point has returned, turning a
//! preemptive signal into a graceful drain.
//!
//! The `main*` functions are meant to be the last statement of a program's
//! `main`:
//!
//! ```no_run
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() -> styx_daemon::Result<()> {
//!     let running = Arc::new(AtomicBool::new(true));
//!     let stop = Arc::clone(&running);
//!
//!     styx_daemon::Daemon::main(
//!         move || {
//!             while running.load(Ordering::Acquire) {
//!                 std::thread::sleep(Duration::from_millis(100));
//!             }
//!         },
//!         move || stop.store(false, Ordering::Release),
//!     )?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::callback::{self, Callback, IntoOutcome};
use crate::error::{Error, Result};
use crate::logging;
use crate::shutdown::{Exit, Phase, ShutdownCoordinator, StopSignal};
use crate::signal;

/// Name used when none is configured.
pub const DEFAULT_DAEMON_NAME: &str = "styx-daemon";

struct HookInner {
    name: String,
    coordinator: ShutdownCoordinator,
    stop: parking_lot::Mutex<Option<Callback>>,
    done: parking_lot::Mutex<Option<Callback>>,
}

impl std::fmt::Debug for HookInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookInner")
            .field("name", &self.name)
            .field("coordinator", &self.coordinator)
            .field("stop_pending", &self.stop.lock().is_some())
            .field("done_pending", &self.done.lock().is_some())
            .finish()
    }
}

/// Handle that delivers a termination request to a daemon.
///
/// The process hook installed by [`Daemon::run`] holds one of these. It can
/// also be obtained through [`Daemon::termination_handle`] to drive shutdown
/// from code, e.g. in embedders that route their own signals.
#[derive(Debug, Clone)]
pub struct TerminationHandle {
    inner: Arc<HookInner>,
}

impl TerminationHandle {
    /// Name of the daemon this handle belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the daemon's entry point has returned.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.coordinator.is_stopped()
    }

    /// Deliver a termination request and block until the daemon is drained.
    ///
    /// Invokes the stop callback unless the entry point already returned or
    /// another request is being handled, then waits until the entry point
    /// has returned and runs the completion callback. Redundant requests
    /// return immediately.
    pub fn terminate(&self) {
        let inner = &self.inner;
        if !inner.coordinator.begin_termination() {
            debug!(daemon = %inner.name, "Ignoring redundant termination request");
            return;
        }

        let _teardown = logging::suppress_teardown();
        info!(daemon = %inner.name, "Stopping daemon");
        let stop = inner.stop.lock().take();
        if let Some(stop) = stop {
            callback::invoke(&inner.name, "stop", stop);
        }

        inner.coordinator.wait_stopped();
        debug!(daemon = %inner.name, "Entry point returned");

        let done = inner.done.lock().take();
        if let Some(done) = done {
            callback::invoke(&inner.name, "done", done);
        }
        inner.coordinator.mark_finished();
        info!(daemon = %inner.name, "Daemon stopped");
    }

    pub(crate) fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A daemon ready to run its entry point.
#[derive(Debug)]
pub struct Daemon {
    handle: TerminationHandle,
    signals: bool,
}

impl Daemon {
    /// Create a new daemon builder.
    #[must_use]
    pub fn builder() -> DaemonBuilder {
        DaemonBuilder::new()
    }

    /// Run `run` until it returns, calling `stop` on termination.
    ///
    /// `run` must return once `stop` has been called. This call does not
    /// return before `run` has returned.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Signal` if the termination hook cannot be
    /// registered. `run` is not started in that case.
    pub fn main<F, R, S, SR>(run: F, stop: S) -> Result<Exit>
    where
        F: FnOnce() -> R,
        R: IntoOutcome,
        S: FnOnce() -> SR + Send + 'static,
        SR: IntoOutcome,
    {
        Self::builder().on_stop(stop).build()?.run(run)
    }

    /// Like [`Daemon::main`], additionally calling `done` once `run` has
    /// returned and `stop` was called or skipped.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Signal` if the termination hook cannot be
    /// registered.
    pub fn main_with_done<F, R, S, SR, D, DR>(run: F, stop: S, done: D) -> Result<Exit>
    where
        F: FnOnce() -> R,
        R: IntoOutcome,
        S: FnOnce() -> SR + Send + 'static,
        SR: IntoOutcome,
        D: FnOnce() -> DR + Send + 'static,
        DR: IntoOutcome,
    {
        Self::builder().on_stop(stop).on_done(done).build()?.run(run)
    }

    /// Run `run` with a [`StopSignal`] that is triggered on termination.
    ///
    /// `run` must return once the signal has been triggered.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Signal` if the termination hook cannot be
    /// registered.
    pub fn main_with_signal<F, R>(run: F) -> Result<Exit>
    where
        F: FnOnce(StopSignal) -> R,
        R: IntoOutcome,
    {
        let signal = StopSignal::new();
        let trigger = signal.clone();
        Self::main(move || run(signal), move || trigger.trigger())
    }

    /// Like [`Daemon::main_with_signal`], passing `arg` through to `run`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Signal` if the termination hook cannot be
    /// registered.
    pub fn main_with_arg<T, F, R>(arg: T, run: F) -> Result<Exit>
    where
        F: FnOnce(T, StopSignal) -> R,
        R: IntoOutcome,
    {
        Self::main_with_signal(move |signal| run(arg, signal))
    }

    /// Handle to deliver termination requests to this daemon.
    #[must_use]
    pub fn termination_handle(&self) -> TerminationHandle {
        self.handle.clone()
    }

    /// Name of this daemon.
    #[must_use]
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Run the entry point on the calling thread.
    ///
    /// The termination hook is registered first (unless disabled with
    /// [`DaemonBuilder::without_signals`]). After `entry` returns, the
    /// completion callback runs here if no termination request arrived;
    /// otherwise this call waits until the hook has finished it.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Signal` if the termination hook cannot be
    /// registered. `entry` is not started in that case.
    #[instrument(skip_all, fields(daemon = %self.handle.name()))]
    pub fn run<F, R>(self, entry: F) -> Result<Exit>
    where
        F: FnOnce() -> R,
        R: IntoOutcome,
    {
        let inner = &self.handle.inner;
        if self.signals {
            signal::install(self.handle.clone())?;
        }

        info!(daemon = %inner.name, "Starting daemon");
        callback::invoke(&inner.name, "run", entry);

        let exit = match inner.coordinator.mark_stopped() {
            Phase::Terminating => {
                debug!(daemon = %inner.name, "Waiting for termination hook to finish");
                inner.coordinator.wait_finished();
                Exit::Terminated
            }
            _ => {
                let done = inner.done.lock().take();
                if let Some(done) = done {
                    let _teardown = logging::suppress_teardown();
                    callback::invoke(&inner.name, "done", done);
                }
                inner.coordinator.mark_finished();
                Exit::Completed
            }
        };

        if self.signals {
            signal::uninstall_handle(&self.handle);
        }
        info!(daemon = %inner.name, %exit, "Daemon exited");
        Ok(exit)
    }
}

/// Builder for [`Daemon`].
pub struct DaemonBuilder {
    name: String,
    stop: Option<Callback>,
    done: Option<Callback>,
    signals: bool,
}

impl DaemonBuilder {
    /// Create a new builder with process signal handling enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_DAEMON_NAME.to_string(),
            stop: None,
            done: None,
            signals: true,
        }
    }

    /// Set the daemon name used in log records.
    #[must_use]
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Set the callback invoked on termination. Required.
    #[must_use]
    pub fn on_stop<S, R>(mut self, stop: S) -> Self
    where
        S: FnOnce() -> R + Send + 'static,
        R: IntoOutcome,
    {
        self.stop = Some(callback::boxed(stop));
        self
    }

    /// Set the callback invoked once everything has stopped.
    #[must_use]
    pub fn on_done<D, R>(mut self, done: D) -> Self
    where
        D: FnOnce() -> R + Send + 'static,
        R: IntoOutcome,
    {
        self.done = Some(callback::boxed(done));
        self
    }

    /// Do not register a process termination hook.
    ///
    /// Termination is then only delivered through
    /// [`Daemon::termination_handle`].
    #[must_use]
    pub const fn without_signals(mut self) -> Self {
        self.signals = false;
        self
    }

    /// Build the daemon.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Config` if no stop callback was set or the name is
    /// empty.
    pub fn build(self) -> Result<Daemon> {
        if self.name.is_empty() {
            return Err(Error::config("Daemon name cannot be empty"));
        }
        let stop = self
            .stop
            .ok_or_else(|| Error::config("A stop callback is required"))?;

        Ok(Daemon {
            handle: TerminationHandle {
                inner: Arc::new(HookInner {
                    name: self.name,
                    coordinator: ShutdownCoordinator::new(),
                    stop: parking_lot::Mutex::new(Some(stop)),
                    done: parking_lot::Mutex::new(self.done),
                }),
            },
            signals: self.signals,
        })
    }
}

impl std::fmt::Debug for DaemonBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonBuilder")
            .field("name", &self.name)
            .field("has_stop", &self.stop.is_some())
            .field("has_done", &self.done.is_some())
            .field("signals", &self.signals)
            .finish()
    }
}

impl Default for DaemonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
